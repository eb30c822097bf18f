//! Prometheus gauges for the database connection pool

use once_cell::sync::Lazy;
use prometheus::{register_int_gauge_vec, IntGaugeVec};
use sqlx::PgPool;
use std::time::Duration;

/// Pool connection count by state (idle/active/max)
static DB_POOL_CONNECTIONS: Lazy<Option<IntGaugeVec>> = Lazy::new(|| {
    match register_int_gauge_vec!(
        "db_pool_connections",
        "Database pool connection count by state",
        &["service", "state"]
    ) {
        Ok(gauge) => Some(gauge),
        Err(e) => {
            tracing::warn!(error = %e, "db_pool_connections gauge not registered");
            None
        }
    }
});

pub(crate) fn update_pool_metrics(pool: &PgPool, service: &str) {
    let Some(gauge) = DB_POOL_CONNECTIONS.as_ref() else {
        return;
    };
    let size = i64::from(pool.size());
    let idle = pool.num_idle() as i64;

    gauge.with_label_values(&[service, "idle"]).set(idle);
    gauge.with_label_values(&[service, "active"]).set(size - idle);
    gauge
        .with_label_values(&[service, "max"])
        .set(i64::from(pool.options().get_max_connections()));
}

/// Refresh the pool gauges every `period` until the pool is closed
pub(crate) fn spawn_pool_metrics_updater(pool: PgPool, service: String, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        while !pool.is_closed() {
            interval.tick().await;
            update_pool_metrics(&pool, &service);
        }
    });
}
