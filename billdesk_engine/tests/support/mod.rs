#![allow(dead_code)]
use billdesk_engine::{
    registry_types::{
        ClientRecord,
        ClientStatus,
        Invoice,
        NewPayment,
        OperatorProfile,
        PaymentRecord,
        RegistryEndpoint,
    },
    traits::{RegistryBackend, RegistryError},
    RegistryDirectory,
};
use mockall::mock;
use serde_json::json;

mock! {
    pub Registry {}
    impl RegistryBackend for Registry {
        async fn search_by_identity(&self, registry: &RegistryEndpoint, query: &str) -> Result<Vec<ClientRecord>, RegistryError>;
        async fn fetch_invoices(&self, registry: &RegistryEndpoint, client_id: i64) -> Result<Vec<Invoice>, RegistryError>;
        async fn fetch_last_payments(&self, registry: &RegistryEndpoint, client_id: i64) -> Result<Vec<PaymentRecord>, RegistryError>;
        async fn send_receipt(&self, registry: &RegistryEndpoint, payment_id: i64) -> Result<(), RegistryError>;
        async fn update_status(&self, registry: &RegistryEndpoint, client_id: i64, status: &ClientStatus) -> Result<(), RegistryError>;
        async fn create_payment(&self, registry: &RegistryEndpoint, payment: &NewPayment) -> Result<Option<PaymentRecord>, RegistryError>;
        async fn who_am_i(&self, registry: &RegistryEndpoint) -> Result<OperatorProfile, RegistryError>;
        async fn list_operators(&self, registry: &RegistryEndpoint) -> Result<Vec<OperatorProfile>, RegistryError>;
    }
}

pub fn directory() -> RegistryDirectory {
    RegistryDirectory::new(vec![
        RegistryEndpoint::new("R1", "https://r1.example.com"),
        RegistryEndpoint::new("R2", "https://r2.example.com"),
        RegistryEndpoint::new("R3", "https://r3.example.com"),
    ])
    .expect("Valid directory")
}

pub fn client(id: i64, identification: &str, name: &str) -> ClientRecord {
    serde_json::from_value(json!({
        "id": id,
        "identificacion": identification,
        "nombre": name,
        "telefonos": "0414-5550000",
        "plan": "Standard",
        "saldo": 0,
        "estado": "Activo"
    }))
    .expect("Valid client")
}

pub fn payment(id: Option<i64>, amount: i64, reference: &str) -> PaymentRecord {
    serde_json::from_value(json!({
        "id": id,
        "fecha": "2024-04-05T10:00:00Z",
        "monto": amount,
        "montoVES": amount * 40,
        "tipoPago": "Efectivo",
        "referencia": reference
    }))
    .expect("Valid payment")
}

pub fn operator(id: &str, name: &str) -> OperatorProfile {
    OperatorProfile { id: id.into(), name: Some(name.to_string()), username: None }
}
