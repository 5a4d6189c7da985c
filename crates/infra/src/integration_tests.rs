//! End-to-end flow across services sharing one set of in-memory stores.
//!
//! Catalog → customer → inventory → rental → payment → return → reports.

use chrono::{Duration, NaiveDate};

use rentdesk_catalog::{BrandInput, LocationInput, LocationType, NewCategory};
use rentdesk_core::{BasisPoints, Money, PageRequest};
use rentdesk_inventory::{ItemInput, ItemStatus, ItemType, UnitCondition, UnitInput, UnitStatus};
use rentdesk_parties::{
    ContactInfo, CustomerTier, CustomerType, NewCustomer, PaymentTerms, SupplierInput, SupplierStatus, SupplierTier,
    SupplierType,
};
use rentdesk_transactions::{
    LineInput, LineType, PaymentMethod, RentalPeriodUnit, ReturnInput, ReturnLineInput, ReturnLineStatus,
    ReturnStatus, ReturnType, TransactionInput, TransactionStatus, TransactionType,
};

use crate::services::{AuthSettings, ServiceError, Services, Stores, TransactionFilter};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, d).unwrap()
}

fn services() -> Services {
    Services::new(
        Stores::in_memory(),
        AuthSettings {
            jwt_secret: b"integration".to_vec(),
            access_token_ttl: Duration::minutes(5),
        },
    )
}

#[tokio::test]
async fn rental_lifecycle_end_to_end() {
    let svc = services();

    let tools = svc
        .catalog
        .create_category(
            NewCategory {
                name: "Tools".into(),
                parent_id: None,
                display_order: 0,
            },
            None,
        )
        .await
        .unwrap();
    let drills = svc
        .catalog
        .create_category(
            NewCategory {
                name: "Drills".into(),
                parent_id: Some(tools.id_typed()),
                display_order: 0,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(drills.path().to_string(), "Tools/Drills");

    let brand = svc
        .catalog
        .create_brand(
            &BrandInput {
                name: "Makita".into(),
                code: Some("MAK".into()),
                description: None,
            },
            None,
        )
        .await
        .unwrap();
    let location = svc
        .catalog
        .create_location(
            &LocationInput {
                code: "WH1".into(),
                name: "Warehouse".into(),
                location_type: LocationType::Warehouse,
                address: "9 Dock Road".into(),
                city: "Springfield".into(),
                state: "IL".into(),
                country: "US".into(),
                postal_code: None,
                contact_number: None,
                email: None,
                manager_user_id: None,
            },
            None,
        )
        .await
        .unwrap();

    let customer = svc
        .parties
        .create_customer(
            NewCustomer {
                customer_code: "CUST-001".into(),
                customer_type: CustomerType::Individual,
                first_name: Some("Jordan".into()),
                last_name: Some("Lee".into()),
                business_name: None,
                contact: ContactInfo::default(),
                tax_id: None,
                customer_tier: CustomerTier::default(),
                credit_limit: Money::zero(),
            },
            None,
        )
        .await
        .unwrap();

    let item = svc
        .inventory
        .create_item(
            &ItemInput {
                item_code: "DRL-18V".into(),
                item_name: "18V hammer drill".into(),
                item_type: ItemType::Rental,
                item_status: ItemStatus::Active,
                category_id: Some(drills.id_typed()),
                brand_id: Some(brand.id_typed()),
                supplier_id: None,
                description: None,
                model_number: None,
                purchase_price: Money::from_major(180),
                rental_price_per_day: Money::from_major(20),
                rental_price_per_week: Money::zero(),
                rental_price_per_month: Money::zero(),
                sale_price: Money::zero(),
                security_deposit: Money::from_major(50),
                min_rental_days: 1,
                max_rental_days: Some(14),
                serial_number_required: false,
                reorder_level: 0,
            },
            None,
        )
        .await
        .unwrap();
    let unit = svc
        .inventory
        .create_unit(
            &UnitInput {
                item_id: item.id_typed(),
                location_id: location.id_typed(),
                unit_code: "DRL-18V-001".into(),
                serial_number: None,
                condition: UnitCondition::Good,
                purchase_date: None,
                purchase_cost: Money::from_major(180),
                notes: None,
            },
            None,
        )
        .await
        .unwrap();

    // Brand and location are now referenced and cannot be removed.
    assert!(matches!(
        svc.catalog.delete_brand(brand.id_typed(), None).await,
        Err(ServiceError::Domain(_))
    ));
    assert!(matches!(
        svc.catalog.delete_location(location.id_typed(), None).await,
        Err(ServiceError::Domain(_))
    ));

    let rental = svc
        .transactions
        .create_transaction(
            &TransactionInput {
                transaction_type: TransactionType::Rental,
                customer_id: Some(customer.id_typed()),
                supplier_id: None,
                location_id: Some(location.id_typed()),
                sales_person_id: None,
                reference_transaction_id: None,
                transaction_date: day(1),
                due_date: Some(day(4)),
                rental_start_date: Some(day(1)),
                rental_end_date: Some(day(4)),
                payment_method: None,
                payment_reference: None,
                notes: None,
            },
            None,
        )
        .await
        .unwrap();
    let rental_id = rental.id_typed();
    svc.transactions
        .add_line(
            rental_id,
            &LineInput {
                line_type: LineType::Product,
                item_id: Some(item.id_typed()),
                inventory_unit_id: Some(unit.id_typed()),
                description: "Hammer drill, 3 days".into(),
                quantity: 1,
                unit_price: Money::from_major(60),
                discount_percentage: None,
                discount_amount: None,
                tax_rate: BasisPoints::default(),
                rental_period_value: Some(3),
                rental_period_unit: Some(RentalPeriodUnit::Day),
                rental_start_date: Some(day(1)),
                rental_end_date: Some(day(4)),
                notes: None,
            },
            None,
        )
        .await
        .unwrap();
    for status in [
        TransactionStatus::Pending,
        TransactionStatus::Confirmed,
        TransactionStatus::InProgress,
    ] {
        svc.transactions.change_status(rental_id, status, None).await.unwrap();
    }
    svc.inventory.rent_unit(unit.id_typed(), 3, None).await.unwrap();
    let paid = svc
        .transactions
        .apply_payment(rental_id, Money::from_major(60), PaymentMethod::CreditCard, Some("AUTH-1"), None)
        .await
        .unwrap();
    assert!(paid.balance_due().is_zero());

    let due = svc.transactions.rentals_due_for_return(day(3), 2).await.unwrap();
    assert_eq!(due.len(), 1);

    let ret = svc
        .rentals
        .create_return(
            &ReturnInput {
                rental_transaction_id: rental_id,
                return_date: day(4),
                expected_return_date: None,
                return_type: ReturnType::Full,
                notes: None,
            },
            None,
        )
        .await
        .unwrap();
    let ret = svc
        .rentals
        .add_line(
            ret.id_typed(),
            &ReturnLineInput {
                inventory_unit_id: unit.id_typed(),
                original_line_id: Some(paid.lines()[0].id_typed()),
                original_quantity: 1,
                returned_quantity: 1,
                condition_on_return: Some(UnitCondition::Good),
                notes: None,
            },
            None,
        )
        .await
        .unwrap();
    let line_id = ret.lines()[0].id_typed();
    svc.rentals
        .change_status(ret.id_typed(), ReturnStatus::InInspection, None)
        .await
        .unwrap();
    for status in [ReturnLineStatus::Inspected, ReturnLineStatus::Processed] {
        svc.rentals
            .set_line_status(ret.id_typed(), line_id, status, None)
            .await
            .unwrap();
    }
    let done = svc.rentals.finalize(ret.id_typed(), None).await.unwrap();
    assert_eq!(done.status(), ReturnStatus::Completed);
    assert!(done.total_late_fee().is_zero());

    let rental = svc.transactions.get_transaction(rental_id).await.unwrap();
    assert_eq!(rental.status(), TransactionStatus::Completed);
    assert_eq!(rental.lines()[0].returned_quantity(), 1);

    let unit = svc.inventory.get_unit(unit.id_typed()).await.unwrap();
    assert_eq!(unit.status(), UnitStatus::Available);

    let customer = svc.parties.get_customer(customer.id_typed()).await.unwrap();
    assert_eq!(customer.lifetime_value(), Money::from_major(60));

    let summary = svc.transactions.summary(Some(day(1)), Some(day(31))).await.unwrap();
    assert_eq!(summary.total_transactions, 1);
    assert_eq!(summary.total_revenue, Money::from_major(60));

    let completed = svc
        .transactions
        .list_transactions(
            &TransactionFilter {
                status: Some(TransactionStatus::Completed),
                ..TransactionFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(completed.total, 1);
}

#[tokio::test]
async fn completed_purchase_updates_supplier_history() {
    let svc = services();
    let supplier = svc
        .parties
        .create_supplier(
            &SupplierInput {
                supplier_code: "SUP-001".into(),
                company_name: "Acme Tools".into(),
                supplier_type: SupplierType::Distributor,
                contact_person: None,
                contact: ContactInfo::default(),
                tax_id: None,
                payment_terms: PaymentTerms::Net30,
                credit_limit: Money::zero(),
                supplier_tier: SupplierTier::default(),
            },
            None,
        )
        .await
        .unwrap();
    svc.parties
        .set_supplier_status(supplier.id_typed(), SupplierStatus::Approved, None)
        .await
        .unwrap();

    let purchase = svc
        .transactions
        .create_transaction(
            &TransactionInput {
                transaction_type: TransactionType::Purchase,
                customer_id: None,
                supplier_id: Some(supplier.id_typed()),
                location_id: None,
                sales_person_id: None,
                reference_transaction_id: None,
                transaction_date: day(9),
                due_date: None,
                rental_start_date: None,
                rental_end_date: None,
                payment_method: None,
                payment_reference: None,
                notes: None,
            },
            None,
        )
        .await
        .unwrap();
    let purchase_id = purchase.id_typed();
    svc.transactions
        .add_line(
            purchase_id,
            &LineInput {
                line_type: LineType::Fee,
                item_id: None,
                inventory_unit_id: None,
                description: "Restock of drill bits".into(),
                quantity: 4,
                unit_price: Money::from_major(25),
                discount_percentage: None,
                discount_amount: None,
                tax_rate: BasisPoints::default(),
                rental_period_value: None,
                rental_period_unit: None,
                rental_start_date: None,
                rental_end_date: None,
                notes: None,
            },
            None,
        )
        .await
        .unwrap();

    for status in [TransactionStatus::Pending, TransactionStatus::Confirmed, TransactionStatus::InProgress] {
        svc.transactions.change_status(purchase_id, status, None).await.unwrap();
    }
    let untouched = svc.parties.get_supplier(supplier.id_typed()).await.unwrap();
    assert_eq!(untouched.total_orders(), 0);

    svc.transactions
        .change_status(purchase_id, TransactionStatus::Completed, None)
        .await
        .unwrap();
    let supplier = svc.parties.get_supplier(supplier.id_typed()).await.unwrap();
    assert_eq!(supplier.total_orders(), 1);
    assert_eq!(supplier.total_spend(), Money::from_major(100));
    assert_eq!(supplier.last_order_date(), Some(day(9)));
}
