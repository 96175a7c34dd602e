//! Billing table access
//!
//! Invoice, transaction, refund, billable item, and investor persistence.
//! Every function takes a borrowed connection; transaction boundaries
//! belong to the caller.

use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{BillableItemId, ClientId, InvoiceId, RefundId, TransactionId};
use domain_billing::{
    BillableItem, CommissionEntry, Invoice, InvoiceItem, Investor, PaymentTransaction, Refund,
};
use domain_settlement::ClientSummary;

use crate::error::DatabaseError;
use crate::rows::{
    basis_columns, BillableItemRow, ClientRow, InvestorRow, InvoiceItemRow, InvoiceRow, RefundRow,
    TransactionRow,
};

const INVOICE_COLUMNS: &str = "id, number, client_id, order_id, invoice_date, due_date, \
     currency, subtotal, tax_rate, tax, total, amount_paid, status, paid_date, deleted, \
     deleted_note, version, created_at, updated_at";

pub(crate) async fn fetch_client(
    conn: &mut PgConnection,
    client_id: ClientId,
) -> Result<ClientSummary, DatabaseError> {
    let row = sqlx::query_as::<_, ClientRow>("SELECT id, name, email FROM clients WHERE id = $1")
        .bind(Uuid::from(client_id))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Client", client_id))?;
    Ok(row.into_domain())
}

pub(crate) async fn fetch_invoice(
    conn: &mut PgConnection,
    invoice_id: InvoiceId,
    lock: bool,
) -> Result<Invoice, DatabaseError> {
    let sql = if lock {
        format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 FOR UPDATE")
    } else {
        format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1")
    };
    let row = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(Uuid::from(invoice_id))
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))?;
    let items = fetch_invoice_items(conn, invoice_id).await?;
    row.into_domain(items)
}

pub(crate) async fn fetch_invoice_items(
    conn: &mut PgConnection,
    invoice_id: InvoiceId,
) -> Result<Vec<InvoiceItem>, DatabaseError> {
    let rows = sqlx::query_as::<_, InvoiceItemRow>(
        "SELECT id, invoice_id, description, amount, currency, service_id, domain_id, \
         billable_id, renewal \
         FROM invoice_items WHERE invoice_id = $1 ORDER BY position",
    )
    .bind(Uuid::from(invoice_id))
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(InvoiceItemRow::into_domain).collect()
}

/// Unpaid, non-deleted invoices for a client, oldest first
///
/// Locked when loading for a consolidation commit so two concurrent runs
/// for the same client serialize on the hub selection.
pub(crate) async fn open_invoices_for_client(
    conn: &mut PgConnection,
    client_id: ClientId,
    lock: bool,
) -> Result<Vec<Invoice>, DatabaseError> {
    let sql = if lock {
        format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE client_id = $1 AND status = 'unpaid' AND deleted = FALSE \
             ORDER BY created_at FOR UPDATE"
        )
    } else {
        format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE client_id = $1 AND status = 'unpaid' AND deleted = FALSE \
             ORDER BY created_at"
        )
    };
    let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(Uuid::from(client_id))
        .fetch_all(&mut *conn)
        .await?;

    let mut invoices = Vec::with_capacity(rows.len());
    for row in rows {
        let items = fetch_invoice_items(conn, InvoiceId::from(row.id)).await?;
        invoices.push(row.into_domain(items)?);
    }
    Ok(invoices)
}

pub(crate) async fn insert_invoice(
    conn: &mut PgConnection,
    invoice: &Invoice,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO invoices (id, number, client_id, order_id, invoice_date, due_date, \
         currency, subtotal, tax_rate, tax, total, amount_paid, status, paid_date, deleted, \
         deleted_note, version, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
         $18, $19)",
    )
    .bind(Uuid::from(invoice.id))
    .bind(&invoice.number)
    .bind(Uuid::from(invoice.client_id))
    .bind(invoice.order_id.map(Uuid::from))
    .bind(invoice.invoice_date)
    .bind(invoice.due_date)
    .bind(invoice.currency.code())
    .bind(invoice.subtotal.amount())
    .bind(invoice.tax_rate.as_decimal())
    .bind(invoice.tax.amount())
    .bind(invoice.total.amount())
    .bind(invoice.amount_paid.amount())
    .bind(invoice.status.as_str())
    .bind(invoice.paid_date)
    .bind(invoice.deleted)
    .bind(&invoice.deleted_note)
    .bind(invoice.version as i32)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&mut *conn)
    .await?;

    replace_invoice_items(conn, invoice).await
}

/// Version-guarded invoice update
///
/// Matches the version the caller loaded and bumps it. Zero rows means
/// another writer committed first; the engines reload and retry.
pub(crate) async fn update_invoice(
    conn: &mut PgConnection,
    invoice: &Invoice,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE invoices SET due_date = $1, subtotal = $2, tax_rate = $3, tax = $4, \
         total = $5, amount_paid = $6, status = $7, paid_date = $8, deleted = $9, \
         deleted_note = $10, version = version + 1, updated_at = $11 \
         WHERE id = $12 AND version = $13",
    )
    .bind(invoice.due_date)
    .bind(invoice.subtotal.amount())
    .bind(invoice.tax_rate.as_decimal())
    .bind(invoice.tax.amount())
    .bind(invoice.total.amount())
    .bind(invoice.amount_paid.amount())
    .bind(invoice.status.as_str())
    .bind(invoice.paid_date)
    .bind(invoice.deleted)
    .bind(&invoice.deleted_note)
    .bind(invoice.updated_at)
    .bind(Uuid::from(invoice.id))
    .bind(invoice.version as i32)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::concurrent("invoice", invoice.number.clone()));
    }

    replace_invoice_items(conn, invoice).await
}

/// Rewrites an invoice's lines to match the aggregate
///
/// Consolidation moves lines between invoices, so a diff buys nothing; the
/// whole set is replaced inside the caller's transaction.
async fn replace_invoice_items(
    conn: &mut PgConnection,
    invoice: &Invoice,
) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
        .bind(Uuid::from(invoice.id))
        .execute(&mut *conn)
        .await?;

    for (position, item) in invoice.items.iter().enumerate() {
        let renewal = item
            .renewal
            .map(|meta| {
                serde_json::to_value(meta)
                    .map_err(|e| DatabaseError::mapping(format!("renewal metadata: {e}")))
            })
            .transpose()?;
        sqlx::query(
            "INSERT INTO invoice_items (id, invoice_id, position, description, amount, \
             currency, service_id, domain_id, billable_id, renewal) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::from(item.id))
        .bind(Uuid::from(invoice.id))
        .bind(position as i32)
        .bind(&item.description)
        .bind(item.amount.amount())
        .bind(item.amount.currency().code())
        .bind(item.service_id.map(Uuid::from))
        .bind(item.domain_id.map(Uuid::from))
        .bind(item.billable_id.map(Uuid::from))
        .bind(renewal)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn fetch_transaction(
    conn: &mut PgConnection,
    transaction_id: TransactionId,
) -> Result<PaymentTransaction, DatabaseError> {
    let row = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, invoice_id, gateway, external_ref, amount, currency, status, raw_payload, \
         created_at, completed_at \
         FROM transactions WHERE id = $1",
    )
    .bind(Uuid::from(transaction_id))
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Transaction", transaction_id))?;
    row.into_domain()
}

/// Inserts a transaction row
///
/// The unique index on `external_ref` is the duplicate-payment guard: a
/// retried webhook collides here and the conflict propagates out as
/// "already processed".
pub(crate) async fn insert_transaction(
    conn: &mut PgConnection,
    transaction: &PaymentTransaction,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO transactions (id, invoice_id, gateway, external_ref, amount, currency, \
         status, raw_payload, created_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(Uuid::from(transaction.id))
    .bind(Uuid::from(transaction.invoice_id))
    .bind(&transaction.gateway)
    .bind(&transaction.external_ref)
    .bind(transaction.amount.amount())
    .bind(transaction.amount.currency().code())
    .bind(transaction.status.as_str())
    .bind(&transaction.raw_payload)
    .bind(transaction.created_at)
    .bind(transaction.completed_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_refund(
    conn: &mut PgConnection,
    refund_id: RefundId,
) -> Result<Refund, DatabaseError> {
    let row = sqlx::query_as::<_, RefundRow>(
        "SELECT id, transaction_id, amount, currency, reason, status, requested_by, \
         authorized_by, decided_by, decision_note, requested_at, authorized_at, decided_at \
         FROM refunds WHERE id = $1",
    )
    .bind(Uuid::from(refund_id))
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Refund", refund_id))?;
    row.into_domain()
}

/// Every refund ever requested against a transaction, locked so the
/// ceiling re-check before approval races with nobody
pub(crate) async fn fetch_refunds_for_transaction(
    conn: &mut PgConnection,
    transaction_id: TransactionId,
    lock: bool,
) -> Result<Vec<Refund>, DatabaseError> {
    let sql = if lock {
        "SELECT id, transaction_id, amount, currency, reason, status, requested_by, \
         authorized_by, decided_by, decision_note, requested_at, authorized_at, decided_at \
         FROM refunds WHERE transaction_id = $1 ORDER BY requested_at FOR UPDATE"
    } else {
        "SELECT id, transaction_id, amount, currency, reason, status, requested_by, \
         authorized_by, decided_by, decision_note, requested_at, authorized_at, decided_at \
         FROM refunds WHERE transaction_id = $1 ORDER BY requested_at"
    };
    let rows = sqlx::query_as::<_, RefundRow>(sql)
        .bind(Uuid::from(transaction_id))
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(RefundRow::into_domain).collect()
}

pub(crate) async fn insert_refund(
    conn: &mut PgConnection,
    refund: &Refund,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO refunds (id, transaction_id, amount, currency, reason, status, \
         requested_by, authorized_by, decided_by, decision_note, requested_at, authorized_at, \
         decided_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(Uuid::from(refund.id))
    .bind(Uuid::from(refund.transaction_id))
    .bind(refund.amount.amount())
    .bind(refund.amount.currency().code())
    .bind(&refund.reason)
    .bind(refund.status.as_str())
    .bind(Uuid::from(refund.requested_by))
    .bind(refund.authorized_by.map(Uuid::from))
    .bind(refund.decided_by.map(Uuid::from))
    .bind(&refund.decision_note)
    .bind(refund.requested_at)
    .bind(refund.authorized_at)
    .bind(refund.decided_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn update_refund(
    conn: &mut PgConnection,
    refund: &Refund,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE refunds SET status = $1, authorized_by = $2, decided_by = $3, \
         decision_note = $4, authorized_at = $5, decided_at = $6 \
         WHERE id = $7",
    )
    .bind(refund.status.as_str())
    .bind(refund.authorized_by.map(Uuid::from))
    .bind(refund.decided_by.map(Uuid::from))
    .bind(&refund.decision_note)
    .bind(refund.authorized_at)
    .bind(refund.decided_at)
    .bind(Uuid::from(refund.id))
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Refund", refund.id));
    }
    Ok(())
}

pub(crate) async fn fetch_investors(
    conn: &mut PgConnection,
) -> Result<Vec<Investor>, DatabaseError> {
    let rows = sqlx::query_as::<_, InvestorRow>(
        "SELECT id, name, basis, rate, flat_amount, currency, active, balance, total_earned, \
         created_at, updated_at \
         FROM investors ORDER BY created_at",
    )
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(InvestorRow::into_domain).collect()
}

pub(crate) async fn update_investor(
    conn: &mut PgConnection,
    investor: &Investor,
) -> Result<(), DatabaseError> {
    let (basis, rate, flat_amount) = basis_columns(&investor.basis);
    let result = sqlx::query(
        "UPDATE investors SET name = $1, basis = $2, rate = $3, flat_amount = $4, \
         active = $5, balance = $6, total_earned = $7, updated_at = $8 \
         WHERE id = $9",
    )
    .bind(&investor.name)
    .bind(basis)
    .bind(rate)
    .bind(flat_amount)
    .bind(investor.active)
    .bind(investor.balance.amount())
    .bind(investor.total_earned.amount())
    .bind(investor.updated_at)
    .bind(Uuid::from(investor.id))
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Investor", investor.id));
    }
    Ok(())
}

pub(crate) async fn insert_commission_entry(
    conn: &mut PgConnection,
    entry: &CommissionEntry,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO commission_entries (id, investor_id, invoice_id, transaction_id, amount, \
         currency, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::from(entry.id))
    .bind(Uuid::from(entry.investor_id))
    .bind(Uuid::from(entry.invoice_id))
    .bind(Uuid::from(entry.transaction_id))
    .bind(entry.amount.amount())
    .bind(entry.amount.currency().code())
    .bind(entry.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn due_billable_items(
    conn: &mut PgConnection,
    today: NaiveDate,
) -> Result<Vec<BillableItem>, DatabaseError> {
    let rows = sqlx::query_as::<_, BillableItemRow>(
        "SELECT id, client_id, description, amount, currency, next_invoice_date, cycle, \
         created_at, updated_at \
         FROM billable_items WHERE next_invoice_date IS NOT NULL AND next_invoice_date <= $1 \
         ORDER BY next_invoice_date",
    )
    .bind(today)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(BillableItemRow::into_domain).collect()
}

pub(crate) async fn update_billable_item(
    conn: &mut PgConnection,
    item: &BillableItem,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE billable_items SET description = $1, amount = $2, next_invoice_date = $3, \
         cycle = $4, updated_at = $5 \
         WHERE id = $6",
    )
    .bind(&item.description)
    .bind(item.amount.amount())
    .bind(item.next_invoice_date)
    .bind(item.cycle.map(|c| c.as_str()))
    .bind(item.updated_at)
    .bind(Uuid::from(item.id))
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("BillableItem", item.id));
    }
    Ok(())
}

/// True if an open invoice already carries a line for the given column
/// value; shared by the sweep's duplicate guards
async fn open_invoice_references(
    conn: &mut PgConnection,
    column: &str,
    id: Uuid,
) -> Result<bool, DatabaseError> {
    let sql = format!(
        "SELECT EXISTS ( \
           SELECT 1 FROM invoice_items item \
           JOIN invoices inv ON inv.id = item.invoice_id \
           WHERE item.{column} = $1 \
             AND inv.status IN ('unpaid', 'partially_paid') \
             AND inv.deleted = FALSE)"
    );
    let exists: (bool,) = sqlx::query_as(&sql).bind(id).fetch_one(conn).await?;
    Ok(exists.0)
}

pub(crate) async fn open_invoice_for_service(
    conn: &mut PgConnection,
    service_id: core_kernel::ServiceId,
) -> Result<bool, DatabaseError> {
    open_invoice_references(conn, "service_id", Uuid::from(service_id)).await
}

pub(crate) async fn open_invoice_for_billable(
    conn: &mut PgConnection,
    billable_id: BillableItemId,
) -> Result<bool, DatabaseError> {
    open_invoice_references(conn, "billable_id", Uuid::from(billable_id)).await
}
