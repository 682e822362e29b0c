//! Column-name constants for the trip report and the master file.

// ── Trip report columns ─────────────────────────────────────────────────────
pub mod report {
    /// Anchor column; the unit identifier sits immediately to its right.
    pub const TRACTOR: &str = "Tractor";
    pub const DATE: &str = "Fecha";
    pub const BUSINESS_UNIT: &str = "Unidad de negocios";
    pub const TRIP: &str = "Viaje";
    pub const CLIENT_PRICE: &str = "Precio Cliente";
    pub const TOTAL_DISTANCE: &str = "Distancia total";

    pub const REQUIRED: [&str; 6] = [
        TRACTOR,
        DATE,
        BUSINESS_UNIT,
        TRIP,
        CLIENT_PRICE,
        TOTAL_DISTANCE,
    ];

    // Optional pass-through fields for the audit view.
    pub const ORIGIN: &str = "Origen";
    pub const DESTINATION: &str = "Destino";
    pub const DRIVER: &str = "Operador";
    pub const CLIENT: &str = "Cliente";
}

// ── Master file columns ─────────────────────────────────────────────────────
pub mod master {
    pub const UNIT_KEY: &str = "Unidad";
    pub const CLASSIFICATION: &str = "Clasificacion";
}

// ── Header conventions ──────────────────────────────────────────────────────
pub mod header {
    /// Prefix given to blank header cells by the sheet decoder.
    pub const UNNAMED_PREFIX: &str = "Unnamed";
    /// The report carries a title banner on the first row.
    pub const REPORT_HEADER_ROW: usize = 1;
    pub const MASTER_HEADER_ROW: usize = 0;
}

// ── Export table names ──────────────────────────────────────────────────────
pub mod tables {
    pub const SUMMARY: &str = "summary";
    pub const AUDIT_FOR_UNIT: &str = "audit-for-unit";
}
