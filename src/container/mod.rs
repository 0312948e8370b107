use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

pub mod provider;

pub use provider::DefaultServiceProvider;

/// Type-erased service, downcast back to its concrete type on lookup.
pub type ServiceHandle = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceState {
    Created,
    Initialized,
    Connected,
    Authenticated,
}

impl ServiceState {
    fn label(&self) -> &'static str {
        match self {
            ServiceState::Created => "created",
            ServiceState::Initialized => "initialized",
            ServiceState::Connected => "connected",
            ServiceState::Authenticated => "authenticated",
        }
    }
}

/// Bookkeeping every service carries: its role, what it depends on,
/// the handles injected for those dependencies and its lifecycle state.
pub struct ServiceManager {
    name: String,
    dependencies: Vec<String>,
    settings: BTreeMap<String, Value>,
    injected: RwLock<HashMap<String, ServiceHandle>>,
    state: RwLock<ServiceState>,
}

impl ServiceManager {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dependencies: Vec::new(),
            settings: BTreeMap::new(),
            injected: RwLock::new(HashMap::new()),
            state: RwLock::new(ServiceState::Created),
        }
    }

    pub fn dependency(mut self, role: &str) -> Self {
        if !self.dependencies.iter().any(|d| d == role) {
            self.dependencies.push(role.to_string());
        }
        self
    }

    pub fn settings(mut self, settings: BTreeMap<String, Value>) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == ServiceState::Authenticated
    }

    fn set_state(&self, state: ServiceState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn inject(&self, role: &str, handle: ServiceHandle) {
        self.injected
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(role.to_string(), handle);
    }

    /// Typed access to an injected dependency.
    pub fn get<T: Any + Send + Sync>(&self, role: &str) -> Result<Arc<T>> {
        let handle = {
            let injected = self.injected.read().unwrap_or_else(PoisonError::into_inner);
            injected.get(role).cloned()
        };
        match handle {
            Some(handle) => handle.downcast::<T>().map_err(|_| Error::ServiceType {
                role: role.to_string(),
            }),
            None if self.dependencies.iter().any(|d| d == role) => Err(Error::ServiceNotReady {
                role: self.name.clone(),
                stage: format!("injected with '{}'", role),
            }),
            None => Err(Error::MissingDependency {
                service: self.name.clone(),
                dependency: role.to_string(),
            }),
        }
    }
}

#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn manager(&self) -> &ServiceManager;

    fn into_handle(self: Arc<Self>) -> ServiceHandle;

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn authenticate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct Container {
    services: HashMap<String, Arc<dyn Service>>,
    registration: Vec<String>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Arc<dyn Service>) -> Result<()> {
        let role = service.manager().name().to_string();
        if self.services.contains_key(&role) {
            return Err(Error::DuplicateService { role });
        }
        self.registration.push(role.clone());
        self.services.insert(role, service);
        Ok(())
    }

    pub fn has(&self, role: &str) -> bool {
        self.services.contains_key(role)
    }

    pub fn roles(&self) -> &[String] {
        &self.registration
    }

    fn entry(&self, role: &str) -> Result<&Arc<dyn Service>> {
        self.services.get(role).ok_or_else(|| Error::UnknownService {
            role: role.to_string(),
        })
    }

    pub fn service<T: Any + Send + Sync>(&self, role: &str) -> Result<Arc<T>> {
        let service = self.entry(role)?;
        Arc::clone(service)
            .into_handle()
            .downcast::<T>()
            .map_err(|_| Error::ServiceType {
                role: role.to_string(),
            })
    }

    pub fn state(&self, role: &str) -> Result<ServiceState> {
        Ok(self.entry(role)?.manager().state())
    }

    pub fn inject_dependencies(&self) -> Result<()> {
        for role in &self.registration {
            let service = self.entry(role)?;
            for dependency in service.manager().dependencies() {
                let target = self.services.get(dependency).ok_or_else(|| Error::MissingDependency {
                    service: role.clone(),
                    dependency: dependency.clone(),
                })?;
                service
                    .manager()
                    .inject(dependency, Arc::clone(target).into_handle());
            }
        }
        Ok(())
    }

    /// Roles ordered so that every service comes after its dependencies.
    pub fn resolution_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::with_capacity(self.registration.len());
        let mut done = HashSet::new();
        let mut visiting = Vec::new();
        for role in &self.registration {
            self.visit(role, &mut visiting, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        role: &str,
        visiting: &mut Vec<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if done.contains(role) {
            return Ok(());
        }
        if let Some(start) = visiting.iter().position(|r| r == role) {
            let mut cycle: Vec<String> = visiting[start..].to_vec();
            cycle.push(role.to_string());
            return Err(Error::DependencyCycle { cycle });
        }

        let service = self.services.get(role).ok_or_else(|| Error::MissingDependency {
            service: visiting.last().cloned().unwrap_or_default(),
            dependency: role.to_string(),
        })?;

        visiting.push(role.to_string());
        for dependency in service.manager().dependencies() {
            self.visit(dependency, visiting, done, order)?;
        }
        visiting.pop();

        done.insert(role.to_string());
        order.push(role.to_string());
        Ok(())
    }

    async fn run_until(&self, target: ServiceState) -> Result<()> {
        let order = self.resolution_order()?;
        self.inject_dependencies()?;

        for role in &order {
            let service = self.entry(role)?;
            let manager = service.manager();
            for stage in [
                ServiceState::Initialized,
                ServiceState::Connected,
                ServiceState::Authenticated,
            ] {
                if stage > target || manager.state() >= stage {
                    continue;
                }
                match stage {
                    ServiceState::Initialized => service.initialize().await?,
                    ServiceState::Connected => service.connect().await?,
                    ServiceState::Authenticated => service.authenticate().await?,
                    ServiceState::Created => {}
                }
                manager.set_state(stage);
                tracing::debug!(service = %role, state = stage.label(), "service state changed");
            }
        }
        Ok(())
    }

    pub async fn initialize(&self) -> Result<()> {
        self.run_until(ServiceState::Initialized).await
    }

    pub async fn connect(&self) -> Result<()> {
        self.run_until(ServiceState::Connected).await
    }

    /// Bring every service up to the authenticated state, dependencies first.
    pub async fn authenticate(&self) -> Result<()> {
        self.run_until(ServiceState::Authenticated).await?;
        tracing::info!(services = self.registration.len(), "container authenticated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        manager: ServiceManager,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &str, deps: &[&str], log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            let manager = deps
                .iter()
                .fold(ServiceManager::new(name), |m, d| m.dependency(d));
            Arc::new(Self {
                manager,
                log: Arc::clone(log),
            })
        }

        fn record(&self, stage: &str) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.manager.name(), stage));
        }
    }

    #[async_trait]
    impl Service for Recorder {
        fn manager(&self) -> &ServiceManager {
            &self.manager
        }

        fn into_handle(self: Arc<Self>) -> ServiceHandle {
            self
        }

        async fn initialize(&self) -> Result<()> {
            self.record("init");
            Ok(())
        }

        async fn connect(&self) -> Result<()> {
            self.record("connect");
            Ok(())
        }

        async fn authenticate(&self) -> Result<()> {
            self.record("auth");
            Ok(())
        }
    }

    fn container(specs: &[(&str, &[&str])], log: &Arc<Mutex<Vec<String>>>) -> Container {
        let mut container = Container::new();
        for (name, deps) in specs {
            container.register(Recorder::new(name, deps, log)).unwrap();
        }
        container
    }

    #[test]
    fn test_resolution_order_puts_dependencies_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = container(
            &[("cdp", &["token", "web3"]), ("token", &["web3"]), ("web3", &[])],
            &log,
        );
        assert_eq!(container.resolution_order().unwrap(), vec!["web3", "token", "cdp"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = container(&[("a", &["b"]), ("b", &["a"])], &log);
        match container.resolution_order() {
            Err(Error::DependencyCycle { cycle }) => assert_eq!(cycle, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_dependency_and_duplicates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut container = container(&[("price", &["smartContract"])], &log);
        assert!(matches!(
            container.inject_dependencies(),
            Err(Error::MissingDependency { .. })
        ));
        assert!(matches!(
            container.register(Recorder::new("price", &[], &log)),
            Err(Error::DuplicateService { .. })
        ));
    }

    #[tokio::test]
    async fn test_authenticate_runs_every_stage_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = container(&[("token", &["web3"]), ("web3", &[])], &log);

        container.initialize().await.unwrap();
        assert_eq!(container.state("web3").unwrap(), ServiceState::Initialized);

        container.authenticate().await.unwrap();
        container.authenticate().await.unwrap();
        assert_eq!(container.state("token").unwrap(), ServiceState::Authenticated);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "web3:init",
                "token:init",
                "web3:connect",
                "web3:auth",
                "token:connect",
                "token:auth"
            ]
        );
    }

    #[tokio::test]
    async fn test_typed_lookup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = container(&[("token", &["web3"]), ("web3", &[])], &log);
        container.authenticate().await.unwrap();

        let token = container.service::<Recorder>("token").unwrap();
        let web3 = token.manager().get::<Recorder>("web3").unwrap();
        assert_eq!(web3.manager().name(), "web3");
        assert!(matches!(container.service::<String>("token"), Err(Error::ServiceType { .. })));
        assert!(matches!(container.service::<Recorder>("exchange"), Err(Error::UnknownService { .. })));
        assert!(matches!(
            token.manager().get::<Recorder>("price"),
            Err(Error::MissingDependency { .. })
        ));
    }
}
