//! Provisioning table access
//!
//! Services, domains, and orders. Same convention as the billing module:
//! borrowed connections, caller-owned transactions.

use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{DomainId, OrderId, ServiceId};
use domain_provisioning::{DomainName, Order, Service};

use crate::error::DatabaseError;
use crate::rows::{DomainRow, OrderHistoryRow, OrderItemRow, OrderRow, ServiceRow};

const SERVICE_COLUMNS: &str = "id, client_id, product_id, name, status, billing_cycle, \
     recurring_amount, currency, next_due_date, created_at, updated_at";

const DOMAIN_COLUMNS: &str = "id, client_id, name, status, registration_years, expiry_date, \
     created_at, updated_at";

pub(crate) async fn fetch_services(
    conn: &mut PgConnection,
    ids: &[ServiceId],
) -> Result<Vec<Service>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let uuids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
    let rows = sqlx::query_as::<_, ServiceRow>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE id = ANY($1)"
    ))
    .bind(&uuids)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(ServiceRow::into_domain).collect()
}

pub(crate) async fn fetch_domains(
    conn: &mut PgConnection,
    ids: &[DomainId],
) -> Result<Vec<DomainName>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let uuids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
    let rows = sqlx::query_as::<_, DomainRow>(&format!(
        "SELECT {DOMAIN_COLUMNS} FROM domains WHERE id = ANY($1)"
    ))
    .bind(&uuids)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(DomainRow::into_domain).collect()
}

pub(crate) async fn update_service(
    conn: &mut PgConnection,
    service: &Service,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE services SET status = $1, billing_cycle = $2, recurring_amount = $3, \
         next_due_date = $4, updated_at = $5 \
         WHERE id = $6",
    )
    .bind(service.status.as_str())
    .bind(service.billing_cycle.as_str())
    .bind(service.recurring_amount.amount())
    .bind(service.next_due_date)
    .bind(service.updated_at)
    .bind(Uuid::from(service.id))
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Service", service.id));
    }
    Ok(())
}

pub(crate) async fn update_domain(
    conn: &mut PgConnection,
    domain: &DomainName,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE domains SET status = $1, registration_years = $2, expiry_date = $3, \
         updated_at = $4 \
         WHERE id = $5",
    )
    .bind(domain.status.as_str())
    .bind(domain.registration_years as i32)
    .bind(domain.expiry_date)
    .bind(domain.updated_at)
    .bind(Uuid::from(domain.id))
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Domain", domain.id));
    }
    Ok(())
}

pub(crate) async fn fetch_order(
    conn: &mut PgConnection,
    order_id: OrderId,
    lock: bool,
) -> Result<Order, DatabaseError> {
    let sql = if lock {
        "SELECT id, number, client_id, status, total, currency, created_at, updated_at \
         FROM orders WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, number, client_id, status, total, currency, created_at, updated_at \
         FROM orders WHERE id = $1"
    };
    let row = sqlx::query_as::<_, OrderRow>(sql)
        .bind(Uuid::from(order_id))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Order", order_id))?;

    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, description, amount, currency, service_id, domain_id, \
         domain_years \
         FROM order_items WHERE order_id = $1 ORDER BY position",
    )
    .bind(Uuid::from(order_id))
    .fetch_all(&mut *conn)
    .await?;
    let items = item_rows
        .into_iter()
        .map(OrderItemRow::into_domain)
        .collect::<Result<Vec<_>, _>>()?;

    let history_rows = sqlx::query_as::<_, OrderHistoryRow>(
        "SELECT order_id, from_status, to_status, note, changed_at \
         FROM order_status_history WHERE order_id = $1 ORDER BY id",
    )
    .bind(Uuid::from(order_id))
    .fetch_all(&mut *conn)
    .await?;
    let history = history_rows
        .into_iter()
        .map(OrderHistoryRow::into_domain)
        .collect::<Result<Vec<_>, _>>()?;

    row.into_domain(items, history)
}

/// Persists an order's new status and appends the history entries added
/// since it was loaded
///
/// The history vec is append-only in the domain, so everything past the
/// stored count is new.
pub(crate) async fn update_order(
    conn: &mut PgConnection,
    order: &Order,
) -> Result<(), DatabaseError> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(Uuid::from(order.id))
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Order", order.id));
    }

    let stored: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM order_status_history WHERE order_id = $1")
            .bind(Uuid::from(order.id))
            .fetch_one(&mut *conn)
            .await?;

    for change in order.history.iter().skip(stored.0 as usize) {
        sqlx::query(
            "INSERT INTO order_status_history (order_id, from_status, to_status, note, \
             changed_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::from(order.id))
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(&change.note)
        .bind(change.changed_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn due_services(
    conn: &mut PgConnection,
    today: NaiveDate,
) -> Result<Vec<Service>, DatabaseError> {
    let rows = sqlx::query_as::<_, ServiceRow>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services \
         WHERE status = 'active' AND next_due_date <= $1 \
         ORDER BY next_due_date"
    ))
    .bind(today)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(ServiceRow::into_domain).collect()
}

pub(crate) async fn expiring_services(
    conn: &mut PgConnection,
    today: NaiveDate,
    horizon_days: i64,
) -> Result<Vec<Service>, DatabaseError> {
    let horizon = today + chrono::Duration::days(horizon_days);
    let rows = sqlx::query_as::<_, ServiceRow>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services \
         WHERE status = 'active' AND next_due_date <= $1 \
         ORDER BY next_due_date"
    ))
    .bind(horizon)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(ServiceRow::into_domain).collect()
}

pub(crate) async fn expiring_domains(
    conn: &mut PgConnection,
    today: NaiveDate,
    horizon_days: i64,
) -> Result<Vec<DomainName>, DatabaseError> {
    let horizon = today + chrono::Duration::days(horizon_days);
    let rows = sqlx::query_as::<_, DomainRow>(&format!(
        "SELECT {DOMAIN_COLUMNS} FROM domains \
         WHERE status = 'active' AND expiry_date IS NOT NULL AND expiry_date <= $1 \
         ORDER BY expiry_date"
    ))
    .bind(horizon)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(DomainRow::into_domain).collect()
}
