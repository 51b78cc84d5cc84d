//! Business logic services

pub mod catalog;
pub mod clock;
pub mod fines;
pub mod loans;
pub mod readers;
pub mod stats;

use std::sync::Arc;

use crate::{config::CirculationConfig, repository::{CirculationStore, Repository}};

use clock::Clock;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub readers: readers::ReadersService,
    pub loans: loans::LoansService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository.
    ///
    /// Circulation goes through `store`, which is the repository's own loans
    /// store in production.
    pub fn new(
        repository: Repository,
        circulation: CirculationConfig,
        store: Arc<dyn CirculationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            readers: readers::ReadersService::new(repository.clone(), circulation.clone()),
            loans: loans::LoansService::new(store, clock.clone(), circulation),
            stats: stats::StatsService::new(repository, clock),
        }
    }
}
