//! Data models for Biblio

pub mod author;
pub mod book;
pub mod category;
pub mod enums;
pub mod loan;
pub mod reader;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookShort};
pub use category::Category;
pub use enums::{LoanStatus, Role};
pub use loan::{Loan, LoanDetails, LoanReturn};
pub use reader::{Reader, ReaderShort};
pub use user::UserClaims;
