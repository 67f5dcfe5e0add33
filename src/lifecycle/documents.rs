//! Document types and their lifecycle entry points
//!
//! One `*_lifecycle(record)` function per document type, each a thin
//! binding of the generic stage-table deriver to that type's table in the
//! global registry. All of them are lenient and null-safe.

use lifecycle_types::{BackendLifecycle, LifecycleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use super::registry::LifecycleRegistry;
use crate::error::LifecycleError;

macro_rules! document_types {
    ($( $variant:ident => $name:literal, $func:ident; )+) => {
        /// Business document categories with a lifecycle
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum DocumentType {
            $( $variant, )+
        }

        impl DocumentType {
            const ALL: &'static [DocumentType] = &[ $( DocumentType::$variant, )+ ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( DocumentType::$variant => $name, )+
                }
            }
        }

        impl FromStr for DocumentType {
            type Err = LifecycleError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $name => Ok(DocumentType::$variant), )+
                    other => Err(LifecycleError::UnknownDocumentType(other.to_string())),
                }
            }
        }

        $(
            #[doc = concat!("Lifecycle of a `", $name, "` record")]
            pub fn $func(record: Option<&Value>) -> LifecycleResult {
                DocumentType::$variant.lifecycle(record)
            }
        )+
    };
}

document_types! {
    WorkOrder => "work_order", work_order_lifecycle;
    PurchaseOrder => "purchase_order", purchase_order_lifecycle;
    PurchaseRequisition => "purchase_requisition", purchase_requisition_lifecycle;
    Quotation => "quotation", quotation_lifecycle;
    SalesDelivery => "sales_delivery", sales_delivery_lifecycle;
    ShipmentNotice => "shipment_notice", shipment_notice_lifecycle;
    Demand => "demand", demand_lifecycle;
    DemandComputation => "demand_computation", demand_computation_lifecycle;
    ProductionPlan => "production_plan", production_plan_lifecycle;
    MaterialBorrow => "material_borrow", material_borrow_lifecycle;
    OtherOutbound => "other_outbound", other_outbound_lifecycle;
    ReworkOrder => "rework_order", rework_order_lifecycle;
    OutsourceWorkOrder => "outsource_work_order", outsource_work_order_lifecycle;
    ExceptionProcess => "exception_process", exception_process_lifecycle;
    IncomingInspection => "incoming_inspection", incoming_inspection_lifecycle;
    Receivable => "receivable", receivable_lifecycle;
    Reporting => "reporting", reporting_lifecycle;
    DeliveryNotice => "delivery_notice", delivery_notice_lifecycle;
    MaintenanceReminder => "maintenance_reminder", maintenance_reminder_lifecycle;
    Stocktaking => "stocktaking", stocktaking_lifecycle;
    PurchaseReceipt => "purchase_receipt", purchase_receipt_lifecycle;
    OtherInbound => "other_inbound", other_inbound_lifecycle;
}

impl DocumentType {
    pub fn all() -> &'static [DocumentType] {
        Self::ALL
    }

    /// Lifecycle via the global registry
    pub fn lifecycle(&self, record: Option<&Value>) -> LifecycleResult {
        LifecycleRegistry::global().derive(self.as_str(), record)
    }

    /// Whether a server-supplied lifecycle would be trusted for this type
    pub fn accepts_backend(&self, lifecycle: &BackendLifecycle) -> bool {
        LifecycleRegistry::global()
            .get(self.as_str())
            .map(|table| table.accepts_backend(lifecycle))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
