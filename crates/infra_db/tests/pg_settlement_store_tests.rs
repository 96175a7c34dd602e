//! Integration tests for the PostgreSQL settlement store
//!
//! Each test runs against an isolated Postgres testcontainer, so the
//! suite needs a local Docker daemon. The tests are `#[ignore]`d to keep
//! the default `cargo test` run container-free; run them with
//! `cargo test -p infra_db -- --ignored`.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{ClientId, Currency, Money, OperatorId};
use domain_billing::{
    BillableItem, Invoice, InvoiceItem, PaymentTransaction, Refund, RefundAuthority, RefundStatus,
};
use domain_provisioning::Service;
use domain_settlement::{
    GeneratedInvoiceBatch, GeneratorSource, RefundActor, RefundCompletionBatch, RefundWorkflow,
    SettlementBatch, SettlementStore, StaticSettings,
};
use infra_db::PgSettlementStore;
use test_utils::{
    ClientBuilder, DateFixtures, InvoiceBuilder, MoneyFixtures, ServiceBuilder, TestDatabase,
};

async fn seed_client(db: &TestDatabase, client_id: ClientId, email: &str) {
    sqlx::query("INSERT INTO clients (id, name, email) VALUES ($1, $2, $3)")
        .bind(Uuid::from(client_id))
        .bind("Rahim Traders")
        .bind(email)
        .execute(db.pool())
        .await
        .expect("Failed to seed client");
}

async fn seed_invoice(db: &TestDatabase, invoice: &Invoice) {
    sqlx::query(
        "INSERT INTO invoices \
         (id, number, client_id, order_id, invoice_date, due_date, currency, subtotal, \
          tax_rate, tax, total, amount_paid, status, paid_date, deleted, deleted_note, \
          version, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
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
    .bind(invoice.deleted_note.as_deref())
    .bind(invoice.version as i32)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(db.pool())
    .await
    .expect("Failed to seed invoice");

    for (position, item) in invoice.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO invoice_items \
             (id, invoice_id, position, description, amount, currency, service_id, \
              domain_id, billable_id, renewal) \
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
        .bind(
            item.renewal
                .as_ref()
                .map(|renewal| serde_json::to_value(renewal).expect("Renewal serializes")),
        )
        .execute(db.pool())
        .await
        .expect("Failed to seed invoice item");
    }
}

async fn seed_service(db: &TestDatabase, service: &Service) {
    sqlx::query(
        "INSERT INTO services \
         (id, client_id, product_id, name, status, billing_cycle, recurring_amount, \
          currency, next_due_date, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(Uuid::from(service.id))
    .bind(Uuid::from(service.client_id))
    .bind(Uuid::from(service.product_id))
    .bind(&service.name)
    .bind(service.status.as_str())
    .bind(service.billing_cycle.as_str())
    .bind(service.recurring_amount.amount())
    .bind(service.recurring_amount.currency().code())
    .bind(service.next_due_date)
    .bind(service.created_at)
    .bind(service.updated_at)
    .execute(db.pool())
    .await
    .expect("Failed to seed service");
}

async fn seed_billable(db: &TestDatabase, billable: &BillableItem) {
    sqlx::query(
        "INSERT INTO billable_items \
         (id, client_id, description, amount, currency, next_invoice_date, cycle, \
          created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(Uuid::from(billable.id))
    .bind(Uuid::from(billable.client_id))
    .bind(&billable.description)
    .bind(billable.amount.amount())
    .bind(billable.amount.currency().code())
    .bind(billable.next_invoice_date)
    .bind(billable.cycle.map(|cycle| cycle.as_str()))
    .bind(billable.created_at)
    .bind(billable.updated_at)
    .execute(db.pool())
    .await
    .expect("Failed to seed billable item");
}

async fn seed_transaction(db: &TestDatabase, transaction: &PaymentTransaction) {
    sqlx::query(
        "INSERT INTO transactions \
         (id, invoice_id, gateway, external_ref, amount, currency, status, raw_payload, \
          created_at, completed_at) \
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
    .execute(db.pool())
    .await
    .expect("Failed to seed transaction");
}

/// A paid invoice plus its captured transaction, seeded directly.
async fn seed_paid_invoice(
    db: &TestDatabase,
    client_id: ClientId,
    external_ref: &str,
) -> (Invoice, PaymentTransaction) {
    let mut invoice = InvoiceBuilder::new()
        .with_client(client_id)
        .with_line("Business Hosting", MoneyFixtures::bdt_100())
        .build();
    let total = invoice.total;
    invoice
        .record_payment(total, Utc::now())
        .expect("payment applies");
    invoice.take_events();
    seed_invoice(db, &invoice).await;

    let transaction =
        PaymentTransaction::successful(invoice.id, "bkash", external_ref, total, None);
    seed_transaction(db, &transaction).await;
    (invoice, transaction)
}

fn settlement_batch(invoice: Invoice, transaction: PaymentTransaction) -> SettlementBatch {
    SettlementBatch {
        invoice,
        transaction,
        order: None,
        services: Vec::new(),
        domains: Vec::new(),
        investors: Vec::new(),
        commission_entries: Vec::new(),
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn settlement_view_loads_invoice_and_client() {
    let db = TestDatabase::new().await.expect("container");
    let client = ClientBuilder::new().with_email("view@example.com").build();
    seed_client(&db, client.id, &client.email).await;

    let invoice = InvoiceBuilder::new()
        .with_client(client.id)
        .with_line("Hosting renewal", MoneyFixtures::bdt_hosting())
        .build();
    seed_invoice(&db, &invoice).await;

    let store = PgSettlementStore::new(db.pool().clone());
    let view = store
        .load_settlement_view(invoice.id)
        .await
        .expect("view loads");

    assert_eq!(view.invoice.id, invoice.id);
    assert_eq!(view.invoice.number, invoice.number);
    assert_eq!(view.invoice.items.len(), 1);
    assert_eq!(view.client.email, "view@example.com");
    assert!(view.order.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn commit_settlement_persists_payment_and_bumps_version() {
    let db = TestDatabase::new().await.expect("container");
    let client = ClientBuilder::new().build();
    seed_client(&db, client.id, &client.email).await;

    let invoice = InvoiceBuilder::new()
        .with_client(client.id)
        .with_line("Setup fee", MoneyFixtures::bdt_100())
        .build();
    seed_invoice(&db, &invoice).await;

    let store = PgSettlementStore::new(db.pool().clone());
    let mut view = store.load_settlement_view(invoice.id).await.expect("view");

    let total = view.invoice.total;
    view.invoice
        .record_payment(total, Utc::now())
        .expect("payment applies");
    let transaction =
        PaymentTransaction::successful(invoice.id, "bkash", "TRX-COMMIT-1", total, None);

    store
        .commit_settlement(settlement_batch(view.invoice, transaction))
        .await
        .expect("commit succeeds");

    let reloaded = store.load_settlement_view(invoice.id).await.expect("view");
    assert!(reloaded.invoice.balance_due().is_zero());
    assert_eq!(reloaded.invoice.version, invoice.version + 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn duplicate_external_ref_surfaces_as_duplicate_conflict() {
    let db = TestDatabase::new().await.expect("container");
    let client = ClientBuilder::new().build();
    seed_client(&db, client.id, &client.email).await;

    let invoice = InvoiceBuilder::new()
        .with_client(client.id)
        .with_line("Setup fee", MoneyFixtures::bdt_100())
        .build();
    seed_invoice(&db, &invoice).await;

    let store = PgSettlementStore::new(db.pool().clone());

    let mut first = store.load_settlement_view(invoice.id).await.expect("view");
    let half = Money::new(dec!(50.00), Currency::BDT);
    first
        .invoice
        .record_payment(half, Utc::now())
        .expect("payment applies");
    let transaction =
        PaymentTransaction::successful(invoice.id, "bkash", "TRX-DUP-1", half, None);
    store
        .commit_settlement(settlement_batch(first.invoice, transaction))
        .await
        .expect("first commit succeeds");

    // Same webhook delivered twice: the reference collides on insert.
    let mut second = store.load_settlement_view(invoice.id).await.expect("view");
    second
        .invoice
        .record_payment(half, Utc::now())
        .expect("payment applies");
    let replay = PaymentTransaction::successful(invoice.id, "bkash", "TRX-DUP-1", half, None);
    let err = store
        .commit_settlement(settlement_batch(second.invoice, replay))
        .await
        .expect_err("replay must collide");

    assert!(err.is_duplicate());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn stale_invoice_version_surfaces_as_transient_conflict() {
    let db = TestDatabase::new().await.expect("container");
    let client = ClientBuilder::new().build();
    seed_client(&db, client.id, &client.email).await;

    let invoice = InvoiceBuilder::new()
        .with_client(client.id)
        .with_line("Setup fee", MoneyFixtures::bdt_100())
        .build();
    seed_invoice(&db, &invoice).await;

    let store = PgSettlementStore::new(db.pool().clone());

    // Two settlements race from the same loaded version.
    let mut winner = store.load_settlement_view(invoice.id).await.expect("view");
    let mut loser = winner.clone();

    let half = Money::new(dec!(50.00), Currency::BDT);
    winner
        .invoice
        .record_payment(half, Utc::now())
        .expect("payment applies");
    store
        .commit_settlement(settlement_batch(
            winner.invoice,
            PaymentTransaction::successful(invoice.id, "bkash", "TRX-RACE-1", half, None),
        ))
        .await
        .expect("winner commits");

    loser
        .invoice
        .record_payment(half, Utc::now())
        .expect("payment applies");
    let err = store
        .commit_settlement(settlement_batch(
            loser.invoice,
            PaymentTransaction::successful(invoice.id, "bkash", "TRX-RACE-2", half, None),
        ))
        .await
        .expect_err("stale version must lose");

    assert!(err.is_transient());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn due_and_expiring_services_respect_dates() {
    let db = TestDatabase::new().await.expect("container");
    let client = ClientBuilder::new().build();
    seed_client(&db, client.id, &client.email).await;

    let due = ServiceBuilder::new().with_client(client.id).lapsed().build();
    let inside_horizon = ServiceBuilder::new()
        .with_client(client.id)
        .with_name("Mail Hosting")
        .with_next_due_date(DateFixtures::due_within_horizon())
        .build();
    let far_future = ServiceBuilder::new()
        .with_client(client.id)
        .with_name("VPS")
        .with_next_due_date(DateFixtures::beyond_horizon())
        .build();
    seed_service(&db, &due).await;
    seed_service(&db, &inside_horizon).await;
    seed_service(&db, &far_future).await;

    let store = PgSettlementStore::new(db.pool().clone());
    let today = DateFixtures::today();

    let due_today = store.due_services(today).await.expect("due query");
    assert_eq!(due_today.len(), 1);
    assert_eq!(due_today[0].id, due.id);

    let expiring = store.expiring_services(today, 30).await.expect("horizon query");
    let ids: Vec<_> = expiring.iter().map(|service| service.id).collect();
    assert!(ids.contains(&due.id));
    assert!(ids.contains(&inside_horizon.id));
    assert!(!ids.contains(&far_future.id));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn generated_invoice_advances_one_time_billable() {
    let db = TestDatabase::new().await.expect("container");
    let client = ClientBuilder::new().build();
    seed_client(&db, client.id, &client.email).await;

    let billable = BillableItem::one_time(
        client.id,
        "Migration assistance",
        MoneyFixtures::bdt_100(),
        DateFixtures::lapsed(),
    );
    seed_billable(&db, &billable).await;

    let store = PgSettlementStore::new(db.pool().clone());
    let today = DateFixtures::today();

    let due = store.due_billable_items(today).await.expect("due query");
    assert_eq!(due.len(), 1);

    let invoice = InvoiceBuilder::new()
        .with_client(client.id)
        .with_item(InvoiceItem::for_billable(
            billable.description.clone(),
            billable.amount,
            billable.id,
        ))
        .build();
    let mut advanced = billable.clone();
    advanced.mark_invoiced();
    store
        .commit_generated_invoice(GeneratedInvoiceBatch {
            invoice: invoice.clone(),
            source: GeneratorSource::Billable(advanced),
        })
        .await
        .expect("commit succeeds");

    assert!(store
        .due_billable_items(today)
        .await
        .expect("due query")
        .is_empty());
    assert!(store
        .has_open_invoice_for_billable(billable.id)
        .await
        .expect("reference query"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn administrator_refund_request_completes_and_persists_row() {
    let db = TestDatabase::new().await.expect("container");
    let client = ClientBuilder::new().build();
    seed_client(&db, client.id, &client.email).await;
    let (invoice, transaction) = seed_paid_invoice(&db, client.id, "TRX-REFUND-1").await;

    let store = Arc::new(PgSettlementStore::new(db.pool().clone()));
    let workflow = RefundWorkflow::new(store.clone(), Arc::new(StaticSettings::default()));

    let amount = Money::new(dec!(40.00), Currency::BDT);
    let outcome = workflow
        .request_refund(
            transaction.id,
            amount,
            "Goodwill credit",
            RefundActor::new(OperatorId::new(), RefundAuthority::Administrator),
        )
        .await
        .expect("collapsed request completes");

    assert_eq!(outcome.refund.status, RefundStatus::Completed);

    let stored = store
        .get_refund(outcome.refund.id)
        .await
        .expect("refund row persisted");
    assert_eq!(stored.status, RefundStatus::Completed);

    let view = store.load_refund_view(transaction.id).await.expect("view");
    assert_eq!(view.refunds.len(), 1);
    assert_eq!(
        view.invoice.amount_paid,
        invoice.total.checked_sub(&amount).expect("same currency")
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn refund_completion_refuses_consumed_ceiling() {
    let db = TestDatabase::new().await.expect("container");
    let client = ClientBuilder::new().build();
    seed_client(&db, client.id, &client.email).await;
    let (_, transaction) = seed_paid_invoice(&db, client.id, "TRX-CEIL-1").await;

    let store = PgSettlementStore::new(db.pool().clone());
    let admin = OperatorId::new();

    // A competing refund already holds most of the captured amount.
    let mut winner = Refund::request(
        transaction.id,
        Money::new(dec!(70.00), Currency::BDT),
        "First return",
        admin,
    )
    .expect("within ceiling");
    winner.authorize(admin, Utc::now()).expect("authorizes");
    winner.complete(admin, Utc::now()).expect("completes");
    store.insert_refund(&winner).await.expect("winner row");

    let mut loser = Refund::request(
        transaction.id,
        Money::new(dec!(50.00), Currency::BDT),
        "Second return",
        admin,
    )
    .expect("request builds");
    store.insert_refund(&loser).await.expect("loser row");
    loser.authorize(admin, Utc::now()).expect("authorizes");
    loser.complete(admin, Utc::now()).expect("completes");

    let mut view = store.load_refund_view(transaction.id).await.expect("view");
    view.invoice
        .apply_refund(loser.amount, Utc::now())
        .expect("refund applies");
    let reversal = PaymentTransaction::internal_refund(view.invoice.id, loser.id, loser.amount);
    let err = store
        .commit_refund_completion(RefundCompletionBatch {
            refund: loser.clone(),
            reversal,
            invoice: view.invoice,
        })
        .await
        .expect_err("overrun must be refused");

    assert!(err.is_transient());
    let stored = store.get_refund(loser.id).await.expect("refund row");
    assert_eq!(stored.status, RefundStatus::PendingAuthorization);
}
