// Ids are cast to bigint so INT4 and INT8 schemas decode the same way.

pub const SELECT_VEHICLE_DOCUMENTS_WITH_EXPIRY: &str = r#"
SELECT id::bigint AS id, expiry_date::text AS expiry_date
FROM documents
WHERE expiry_date IS NOT NULL
ORDER BY id;
"#;

pub const SELECT_DRIVER_DOCUMENTS_WITH_EXPIRY: &str = r#"
SELECT id::bigint AS id, expiry_date::text AS expiry_date
FROM driver_documents
WHERE expiry_date IS NOT NULL
ORDER BY id;
"#;

pub const SELECT_PENDING_ALERTS_WITH_EXPIRY: &str = r#"
SELECT
    a.id::bigint AS alert_id,
    a.document_id::bigint AS document_id,
    a.driver_document_id::bigint AS driver_document_id,
    a.alert_type::text AS alert_type,
    COALESCE(d.expiry_date::text, dd.expiry_date::text) AS expiry_date
FROM alerts a
LEFT JOIN documents d ON a.document_id = d.id
LEFT JOIN driver_documents dd ON a.driver_document_id = dd.id
WHERE a.is_sent = FALSE
ORDER BY a.id;
"#;

pub const LOCK_DOCUMENT_ALERTS: &str = r#"
SELECT pg_advisory_xact_lock($1);
"#;

pub const DELETE_SUPERSEDED_VEHICLE_ALERTS: &str = r#"
DELETE FROM alerts
WHERE document_id = $1 AND alert_type::text <> $2 AND is_sent = FALSE;
"#;

pub const DELETE_SUPERSEDED_DRIVER_ALERTS: &str = r#"
DELETE FROM alerts
WHERE driver_document_id = $1 AND alert_type::text <> $2 AND is_sent = FALSE;
"#;

pub const EXISTS_VEHICLE_ALERT: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM alerts WHERE document_id = $1 AND alert_type::text = $2 AND is_sent = FALSE
);
"#;

pub const EXISTS_DRIVER_ALERT: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM alerts WHERE driver_document_id = $1 AND alert_type::text = $2 AND is_sent = FALSE
);
"#;

pub const INSERT_VEHICLE_ALERT: &str = r#"
INSERT INTO alerts (document_id, alert_type, alert_date)
VALUES ($1, $2, $3);
"#;

pub const INSERT_DRIVER_ALERT: &str = r#"
INSERT INTO alerts (driver_document_id, alert_type, alert_date)
VALUES ($1, $2, $3);
"#;

// Only deletes the row if it is still pending with the label that was judged stale.
pub const DELETE_PENDING_ALERT: &str = r#"
DELETE FROM alerts
WHERE id = $1 AND alert_type::text = $2 AND is_sent = FALSE;
"#;

pub const SELECT_ACTIVE_VEHICLE_ALERTS: &str = r#"
SELECT
    a.id::bigint AS id,
    a.document_id::bigint AS document_id,
    NULL::bigint AS driver_document_id,
    a.alert_type::text AS alert_type,
    a.alert_date,
    'vehicle' AS source_type,
    d.file_code::text AS doc_code,
    d.file_name::text AS doc_name,
    d.file_type::text AS doc_type,
    d.expiry_date::text AS expiry_date,
    v.license_plate::text AS license_plate,
    v.model::text AS model,
    v.department::text AS department,
    NULL::text AS driver_name
FROM alerts a
JOIN documents d ON a.document_id = d.id
JOIN vehicles v ON d.vehicle_id = v.id
WHERE a.is_sent = FALSE AND a.document_id IS NOT NULL;
"#;

pub const SELECT_ACTIVE_DRIVER_ALERTS: &str = r#"
SELECT
    a.id::bigint AS id,
    NULL::bigint AS document_id,
    a.driver_document_id::bigint AS driver_document_id,
    a.alert_type::text AS alert_type,
    a.alert_date,
    'driver' AS source_type,
    dd.doc_code::text AS doc_code,
    dd.doc_name::text AS doc_name,
    dd.doc_type::text AS doc_type,
    dd.expiry_date::text AS expiry_date,
    NULL::text AS license_plate,
    NULL::text AS model,
    dr.department::text AS department,
    dr.name::text AS driver_name
FROM alerts a
JOIN driver_documents dd ON a.driver_document_id = dd.id
JOIN drivers dr ON dd.driver_id = dr.id
WHERE a.is_sent = FALSE AND a.driver_document_id IS NOT NULL;
"#;

pub const ACKNOWLEDGE_ALERT: &str = r#"
UPDATE alerts
SET is_sent = TRUE,
    sent_at = $2
WHERE id = $1 AND is_sent = FALSE
RETURNING
    id::bigint AS id,
    document_id::bigint AS document_id,
    driver_document_id::bigint AS driver_document_id,
    alert_type::text AS alert_type,
    alert_date,
    is_sent,
    sent_at;
"#;
