//! Integration tests for landlord-queue

use landlord_queue::*;
use landlord_tenancy::{
    InMemoryTenantStore, Settings, TaskEntry, Tenancy, TenancyConfig, Tenant, TenantId,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

const DATABASE_KEY: &str = "database.connections.tenant.database";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn acme() -> Tenant {
    Tenant::new("1", "acme").with_domain("acme.example.com")
}

fn tenancy(store: Arc<InMemoryTenantStore>) -> Tenancy {
    let config = TenancyConfig {
        switch_tenant_tasks: vec![TaskEntry::from("switch_database")],
        database_prefix: "tenant_".to_string(),
        ..Default::default()
    };

    Tenancy::builder()
        .config(config)
        .settings(Settings::from_pairs([(DATABASE_KEY, "landlord")]))
        .directory(store)
        .build()
        .unwrap()
}

fn store() -> Arc<InMemoryTenantStore> {
    Arc::new(InMemoryTenantStore::with_tenants([acme()]).unwrap())
}

/// Dispatch a job from a request handled for acme
async fn dispatch_for_acme(tenancy: &Tenancy, job_type: &str) -> Job {
    let dispatcher = TenantAwareDispatcher::for_tenancy(tenancy);
    let mut ctx = tenancy.context();
    ctx.make_current(&acme()).await.unwrap();

    let job = dispatcher.prepare(&ctx, Job::new("default", job_type, json!({"invoice": 7})));
    tenancy.end(ctx).await.unwrap();
    job
}

#[tokio::test]
async fn test_job_runs_in_dispatching_tenant() {
    init_tracing();
    let tenancy = tenancy(store());
    let job = dispatch_for_acme(&tenancy, "send_invoice").await;
    assert_eq!(job.tenant_id(), Some(&TenantId::from("1")));

    // The worker process only sees the serialized job
    let encoded = serde_json::to_string(&job).unwrap();
    let mut job: Job = serde_json::from_str(&encoded).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut worker = TenantAwareWorker::new(tenancy.clone());
    let record = seen.clone();
    worker.register_handler("send_invoice", move |_job, tenant, settings| {
        let record = record.clone();
        async move {
            record.lock().unwrap().push((
                tenant.map(|t| t.name),
                settings.get_string(DATABASE_KEY),
            ));
            Ok(())
        }
    });

    worker.process(&mut job).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(Some("acme".to_string()), Some("tenant_acme".to_string()))]
    );
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts, 1);
    assert_eq!(
        tenancy.settings().get_string(DATABASE_KEY).as_deref(),
        Some("landlord")
    );
}

#[tokio::test]
async fn test_tenant_forgotten_after_failing_job() {
    let tenancy = tenancy(store());
    let mut job = dispatch_for_acme(&tenancy, "send_invoice").await;

    let mut worker = TenantAwareWorker::new(tenancy.clone());
    worker.register_handler("send_invoice", |_job, _tenant, _settings| async move {
        Err(JobError::ExecutionFailed("smtp unavailable".to_string()))
    });

    let result = worker.process(&mut job).await;

    assert!(matches!(result, Err(JobError::ExecutionFailed(_))));
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(
        tenancy.settings().get_string(DATABASE_KEY).as_deref(),
        Some("landlord")
    );
}

#[tokio::test]
async fn test_deleted_tenant_fails_job() {
    let store = store();
    let tenancy = tenancy(store.clone());
    let mut job = dispatch_for_acme(&tenancy, "send_invoice").await;

    store.remove(&TenantId::from("1"));

    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();
    let mut worker = TenantAwareWorker::new(tenancy.clone());
    worker.register_handler("send_invoice", move |_job, _tenant, _settings| {
        let flag = flag.clone();
        async move {
            *flag.lock().unwrap() = true;
            Ok(())
        }
    });

    let result = worker.process(&mut job).await;

    assert!(matches!(result, Err(JobError::TenantNotFound(id)) if id.as_str() == "1"));
    assert!(!*ran.lock().unwrap());
    assert_eq!(job.state, JobState::Dead);
    assert_eq!(job.attempts, 1);
}

#[tokio::test]
async fn test_concurrent_jobs_keep_their_own_database() {
    let store = Arc::new(
        InMemoryTenantStore::with_tenants([acme(), Tenant::new("2", "globex")]).unwrap(),
    );
    let tenancy = tenancy(store);
    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut worker = TenantAwareWorker::new(tenancy.clone());
    let record = seen.clone();
    worker.register_handler("report", move |_job, tenant, settings| {
        let barrier = barrier.clone();
        let record = record.clone();
        async move {
            // Both jobs hold their tenant before either reads its settings
            barrier.wait().await;
            record.lock().unwrap().push((
                tenant.map(|t| t.name),
                settings.get_string(DATABASE_KEY),
            ));
            Ok(())
        }
    });
    let worker = Arc::new(worker);

    let mut handles = Vec::new();
    for tenant in [acme(), Tenant::new("2", "globex")] {
        let worker = worker.clone();
        handles.push(tokio::spawn(async move {
            let mut job = Job::new("default", "report", json!({})).with_tenant(tenant.to_ref());
            worker.process(&mut job).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (Some("acme".to_string()), Some("tenant_acme".to_string())),
            (Some("globex".to_string()), Some("tenant_globex".to_string())),
        ]
    );
    assert_eq!(
        tenancy.settings().get_string(DATABASE_KEY).as_deref(),
        Some("landlord")
    );
}

#[tokio::test]
async fn test_not_tenant_aware_job_runs_without_tenant() {
    let config = TenancyConfig {
        switch_tenant_tasks: vec![TaskEntry::from("switch_database")],
        queue: landlord_tenancy::QueueConfig {
            not_tenant_aware_jobs: vec!["prune_sessions".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };
    let tenancy = Tenancy::builder()
        .config(config)
        .directory(store())
        .build()
        .unwrap();

    let mut job = dispatch_for_acme(&tenancy, "prune_sessions").await;
    assert!(job.tenant.is_none());

    let mut worker = TenantAwareWorker::new(tenancy);
    worker.register_handler("prune_sessions", |_job, tenant, _settings| async move {
        match tenant {
            None => Ok(()),
            Some(t) => Err(JobError::ExecutionFailed(format!("ran inside {}", t.name))),
        }
    });

    worker.process(&mut job).await.unwrap();
}
