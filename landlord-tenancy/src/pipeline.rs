//! Task Pipeline
//!
//! The ordered set of switch tasks run on every tenant switch, and the
//! registry that resolves configured task names into it once at startup.

use crate::config::TenancyConfig;
use crate::error::{ConfigError, SwitchPhase, TenantError};
use crate::settings::Settings;
use crate::task::SwitchTenantTask;
use crate::tasks::{EnvironmentTask, FilesystemTask, PrefixCacheTask, SwitchDatabaseTask};
use crate::tenant::Tenant;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Ordered, immutable list of switch tasks
#[derive(Clone, Default)]
pub struct TaskPipeline {
    tasks: Arc<[Arc<dyn SwitchTenantTask>]>,
}

impl TaskPipeline {
    /// Create a pipeline from tasks in run order
    pub fn new(tasks: Vec<Arc<dyn SwitchTenantTask>>) -> Self {
        Self {
            tasks: tasks.into(),
        }
    }

    /// Empty pipeline
    pub fn empty() -> Self {
        Self::default()
    }

    /// Task names in run order
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the pipeline has no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every task's `make_current` in declaration order.
    ///
    /// On the first failure the remaining tasks are skipped and the tasks
    /// that already ran are forgotten again, so no half-switched environment
    /// is left behind.
    pub async fn make_current(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TenantError> {
        for (index, task) in self.tasks.iter().enumerate() {
            debug!(task = task.name(), tenant_id = %tenant.id, "make_current");

            if let Err(source) = task.make_current(tenant, settings).await {
                error!(
                    task = task.name(),
                    tenant_id = %tenant.id,
                    error = %source,
                    "switch task failed, unwinding"
                );
                self.unwind(&self.tasks[..index], tenant, settings).await;
                return Err(TenantError::SwitchTaskFailure {
                    task: task.name().to_string(),
                    phase: SwitchPhase::MakeCurrent,
                    tenant: tenant.id.clone(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Run every task's `forget` in declaration order.
    ///
    /// Forget hooks are independent resets, so a failure does not stop the
    /// rest; the first failure is reported.
    pub async fn forget(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TenantError> {
        let mut first_failure = None;

        for task in self.tasks.iter() {
            debug!(task = task.name(), tenant_id = %tenant.id, "forget");

            if let Err(source) = task.forget(tenant, settings).await {
                error!(
                    task = task.name(),
                    tenant_id = %tenant.id,
                    error = %source,
                    "switch task failed to forget tenant"
                );
                if first_failure.is_none() {
                    first_failure = Some(TenantError::SwitchTaskFailure {
                        task: task.name().to_string(),
                        phase: SwitchPhase::Forget,
                        tenant: tenant.id.clone(),
                        source,
                    });
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn unwind(&self, applied: &[Arc<dyn SwitchTenantTask>], tenant: &Tenant, settings: &Settings) {
        for task in applied {
            if let Err(e) = task.forget(tenant, settings).await {
                warn!(task = task.name(), tenant_id = %tenant.id, error = %e, "unwind failed");
            }
        }
    }
}

impl fmt::Debug for TaskPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPipeline")
            .field("tasks", &self.task_names())
            .finish()
    }
}

/// Factory building a task from configuration
pub type TaskFactory =
    Arc<dyn Fn(&TenancyConfig, &Settings) -> Arc<dyn SwitchTenantTask> + Send + Sync>;

/// Registry of task names to factories
#[derive(Clone)]
pub struct TaskRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl TaskRegistry {
    /// Registry with no tasks
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in tasks
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(SwitchDatabaseTask::NAME, |config, settings| {
            Arc::new(SwitchDatabaseTask::new(
                settings.clone(),
                &config.tenant_connection,
                &config.landlord_connection,
                &config.database_prefix,
            ))
        });
        registry.register(FilesystemTask::NAME, |config, settings| {
            Arc::new(FilesystemTask::new(
                settings.clone(),
                config.filesystem.clone(),
                &config.storage_path,
                &config.app_url,
            ))
        });
        registry.register(EnvironmentTask::NAME, |_, settings| {
            Arc::new(EnvironmentTask::new(settings.clone()))
        });
        registry.register(PrefixCacheTask::NAME, |_, settings| {
            Arc::new(PrefixCacheTask::new(settings.clone()))
        });

        registry
    }

    /// Register (or replace) a factory
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&TenancyConfig, &Settings) -> Arc<dyn SwitchTenantTask> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Resolve the configured task list into a pipeline
    pub fn build(
        &self,
        config: &TenancyConfig,
        settings: &Settings,
    ) -> Result<TaskPipeline, ConfigError> {
        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(config.switch_tenant_tasks.len());

        for entry in &config.switch_tenant_tasks {
            let name = entry.name();
            let factory = self
                .factories
                .get(name)
                .ok_or_else(|| ConfigError::UnknownTask(name.to_string()))?;

            if !seen.insert(name) {
                return Err(ConfigError::DuplicateTask(name.to_string()));
            }
            if !entry.enabled() {
                debug!(task = name, "switch task disabled");
                continue;
            }

            tasks.push(factory(config, settings));
        }

        let pipeline = TaskPipeline::new(tasks);
        debug!(tasks = ?pipeline.task_names(), "task pipeline built");
        Ok(pipeline)
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskEntry;
    use crate::error::TaskError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_make_current: bool,
        fail_forget: bool,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                log: log.clone(),
                fail_make_current: false,
                fail_forget: false,
            }
        }
    }

    #[async_trait]
    impl SwitchTenantTask for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn make_current(&self, tenant: &Tenant, _settings: &Settings) -> Result<(), TaskError> {
            self.log
                .lock()
                .push(format!("{}:make_current:{}", self.name, tenant.name));
            if self.fail_make_current {
                return Err(TaskError::Other("boom".to_string()));
            }
            Ok(())
        }

        async fn forget(&self, tenant: &Tenant, _settings: &Settings) -> Result<(), TaskError> {
            self.log
                .lock()
                .push(format!("{}:forget:{}", self.name, tenant.name));
            if self.fail_forget {
                return Err(TaskError::Other("boom".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_runs_in_declaration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = TaskPipeline::new(vec![
            Arc::new(Recorder::new("a", &log)),
            Arc::new(Recorder::new("b", &log)),
        ]);
        let tenant = Tenant::new("1", "acme");
        let settings = Settings::new();

        pipeline.make_current(&tenant, &settings).await.unwrap();
        pipeline.forget(&tenant, &settings).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "a:make_current:acme",
                "b:make_current:acme",
                "a:forget:acme",
                "b:forget:acme",
            ]
        );
    }

    #[tokio::test]
    async fn test_make_current_failure_unwinds_applied_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new("b", &log);
        failing.fail_make_current = true;

        let pipeline = TaskPipeline::new(vec![
            Arc::new(Recorder::new("a", &log)),
            Arc::new(failing),
            Arc::new(Recorder::new("c", &log)),
        ]);

        let err = pipeline
            .make_current(&Tenant::new("1", "acme"), &Settings::new())
            .await
            .unwrap_err();

        match err {
            TenantError::SwitchTaskFailure { task, phase, .. } => {
                assert_eq!(task, "b");
                assert_eq!(phase, SwitchPhase::MakeCurrent);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            *log.lock(),
            vec!["a:make_current:acme", "b:make_current:acme", "a:forget:acme"]
        );
    }

    #[tokio::test]
    async fn test_forget_continues_after_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new("a", &log);
        failing.fail_forget = true;

        let pipeline = TaskPipeline::new(vec![Arc::new(failing), Arc::new(Recorder::new("b", &log))]);

        let err = pipeline
            .forget(&Tenant::new("1", "acme"), &Settings::new())
            .await
            .unwrap_err();
        assert!(err.is_switch_failure());
        assert_eq!(*log.lock(), vec!["a:forget:acme", "b:forget:acme"]);
    }

    #[test]
    fn test_registry_builds_configured_order() {
        let config = TenancyConfig {
            switch_tenant_tasks: vec![
                "prefix_cache".into(),
                "switch_database".into(),
                TaskEntry::Toggle {
                    name: "environment".to_string(),
                    enabled: false,
                },
                "filesystem".into(),
            ],
            ..TenancyConfig::default()
        };

        let pipeline = TaskRegistry::new().build(&config, &Settings::new()).unwrap();
        assert_eq!(
            pipeline.task_names(),
            vec!["prefix_cache", "switch_database", "filesystem"]
        );
    }

    #[test]
    fn test_registry_rejects_unknown_and_duplicate_tasks() {
        let registry = TaskRegistry::new();
        let settings = Settings::new();

        let unknown = TenancyConfig {
            switch_tenant_tasks: vec!["switch_route_cache".into()],
            ..TenancyConfig::default()
        };
        assert!(matches!(
            registry.build(&unknown, &settings),
            Err(ConfigError::UnknownTask(name)) if name == "switch_route_cache"
        ));

        let duplicate = TenancyConfig {
            switch_tenant_tasks: vec!["environment".into(), "environment".into()],
            ..TenancyConfig::default()
        };
        assert!(matches!(
            registry.build(&duplicate, &settings),
            Err(ConfigError::DuplicateTask(_))
        ));
    }

    #[test]
    fn test_custom_factory() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::empty();
        let shared = log.clone();
        registry.register("recorder", move |_, _| Arc::new(Recorder::new("recorder", &shared)));

        let config = TenancyConfig {
            switch_tenant_tasks: vec!["recorder".into()],
            ..TenancyConfig::default()
        };
        let pipeline = registry.build(&config, &Settings::new()).unwrap();
        assert_eq!(pipeline.len(), 1);
        assert!(!registry.contains("switch_database"));
    }
}
