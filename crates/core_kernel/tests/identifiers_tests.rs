//! Comprehensive unit tests for the Identifiers module
//!
//! Tests cover all identifier types, their creation, parsing,
//! conversion, and display formatting.

use core_kernel::{
    BillableItemId, ClientId, CommissionEntryId, DomainId, InvestorId, InvoiceId, InvoiceItemId,
    OperatorId, OrderId, OrderItemId, ProductId, RefundId, ServiceId, TransactionId,
};
use uuid::Uuid;

mod invoice_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = InvoiceId::new();
        let id2 = InvoiceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = InvoiceId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = InvoiceId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = InvoiceId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(InvoiceId::prefix(), "INV");
    }

    #[test]
    fn test_display_format() {
        let id = InvoiceId::new();
        let display = id.to_string();
        assert!(display.starts_with("INV-"));
    }

    #[test]
    fn test_from_str_with_prefix() {
        let original = InvoiceId::new();
        let string = original.to_string();
        let parsed: InvoiceId = string.parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_uuid_conversion() {
        let uuid = Uuid::new_v4();
        let id: InvoiceId = uuid.into();
        let back: Uuid = id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn test_json_serialization() {
        let id = InvoiceId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: InvoiceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}

mod transaction_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = TransactionId::new();
        let id2 = TransactionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(TransactionId::prefix(), "TXN");
    }

    #[test]
    fn test_roundtrip() {
        let original = TransactionId::new();
        let string = original.to_string();
        let parsed: TransactionId = string.parse().unwrap();
        assert_eq!(original, parsed);
    }
}

mod refund_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = RefundId::new();
        let id2 = RefundId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(RefundId::prefix(), "RFD");
    }

    #[test]
    fn test_display_format() {
        let id = RefundId::new();
        let display = id.to_string();
        assert!(display.starts_with("RFD-"));
    }
}

mod service_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = ServiceId::new();
        let id2 = ServiceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(ServiceId::prefix(), "SVC");
    }

    #[test]
    fn test_display_format() {
        let id = ServiceId::new();
        let display = id.to_string();
        assert!(display.starts_with("SVC-"));
    }
}

mod cross_type_tests {
    use super::*;

    #[test]
    fn test_different_id_types_are_distinct() {
        // Same UUID should create different identifier instances
        // that are type-safe (can't mix ServiceId with DomainId)
        let uuid = Uuid::new_v4();
        let service_id = ServiceId::from_uuid(uuid);
        let domain_id = DomainId::from_uuid(uuid);

        // They contain the same UUID but are different types
        assert_eq!(*service_id.as_uuid(), *domain_id.as_uuid());
    }

    #[test]
    fn test_id_prefixes_are_unique() {
        let prefixes = vec![
            ClientId::prefix(),
            InvestorId::prefix(),
            InvoiceId::prefix(),
            InvoiceItemId::prefix(),
            TransactionId::prefix(),
            RefundId::prefix(),
            BillableItemId::prefix(),
            CommissionEntryId::prefix(),
            ServiceId::prefix(),
            DomainId::prefix(),
            OrderId::prefix(),
            OrderItemId::prefix(),
            ProductId::prefix(),
            OperatorId::prefix(),
        ];

        // Check all prefixes are unique
        let mut unique_prefixes: Vec<&str> = prefixes.clone();
        unique_prefixes.sort();
        unique_prefixes.dedup();

        assert_eq!(
            prefixes.len(),
            unique_prefixes.len(),
            "All identifier prefixes should be unique"
        );
    }
}

mod edge_cases {
    use super::*;

    #[test]
    fn test_nil_uuid() {
        let nil_uuid = Uuid::nil();
        let id = InvoiceId::from_uuid(nil_uuid);
        assert!(id.as_uuid().is_nil());
    }

    #[test]
    fn test_max_uuid() {
        let max_uuid = Uuid::max();
        let id = InvoiceId::from_uuid(max_uuid);
        assert_eq!(*id.as_uuid(), max_uuid);
    }
}
