//! Entity-type to backend routing built from environment profiles.

use std::sync::Arc;

use tracing::debug;

use palisade_core::{
    BackendStatus, CoreError, CoreResult, EntityBackend, EnvironmentProfile, ProfileRegistry,
    ProviderCatalog, TargetSelector,
};

#[derive(Debug)]
struct Route {
    environment: EnvironmentProfile,
    backend: Arc<dyn EntityBackend>,
}

/// Maps entity types onto opened backends.
///
/// Routing follows the declared environment order: an environment explicitly
/// targeting the type wins over a catch-all, and among equals the earliest
/// declared wins. With a single environment everything routes there, so the
/// junction type always finds a home.
#[derive(Debug)]
pub struct BackendRouter {
    routes: Vec<Route>,
}

impl BackendRouter {
    /// Opens one backend per environment profile through the catalog.
    pub async fn connect(
        environments: &[EnvironmentProfile],
        catalog: &ProviderCatalog,
        registry: Arc<ProfileRegistry>,
    ) -> CoreResult<Self> {
        if environments.is_empty() {
            return Err(CoreError::validation(
                "at least one environment profile is required",
            ));
        }
        let mut routes = Vec::with_capacity(environments.len());
        for environment in environments {
            let provider = catalog.backend(&environment.backend).ok_or_else(|| {
                CoreError::validation(format!(
                    "environment `{}` names unknown backend provider `{}`",
                    environment.name, environment.backend
                ))
            })?;
            let backend = provider.open(environment, Arc::clone(&registry)).await?;
            debug!(
                "environment `{}` connected through provider `{}`",
                environment.name, environment.backend
            );
            routes.push(Route {
                environment: environment.clone(),
                backend,
            });
        }
        Ok(Self { routes })
    }

    /// Resolves the backend serving an entity type.
    pub fn backend_for(&self, entity_type: &str) -> CoreResult<&Arc<dyn EntityBackend>> {
        let mut catch_all = None;
        for route in &self.routes {
            match &route.environment.targets {
                TargetSelector::Types(types) => {
                    if types.iter().any(|name| name == entity_type) {
                        return Ok(&route.backend);
                    }
                }
                TargetSelector::All => {
                    if catch_all.is_none() {
                        catch_all = Some(&route.backend);
                    }
                }
            }
        }
        if let Some(backend) = catch_all {
            return Ok(backend);
        }
        if self.routes.len() == 1 {
            return Ok(&self.routes[0].backend);
        }
        Err(CoreError::validation(format!(
            "no environment routes entity type `{entity_type}`"
        )))
    }

    /// Prepares every backend against a new registry snapshot.
    pub async fn prepare_all(&self, registry: &Arc<ProfileRegistry>) -> CoreResult<()> {
        for route in &self.routes {
            route.backend.prepare(Arc::clone(registry)).await?;
        }
        Ok(())
    }

    /// Health of every connected backend, paired with its environment name.
    pub async fn statuses(&self) -> CoreResult<Vec<(String, BackendStatus)>> {
        let mut statuses = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            statuses.push((route.environment.name.clone(), route.backend.status().await?));
        }
        Ok(statuses)
    }
}
