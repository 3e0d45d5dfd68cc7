use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use tracing::warn;
use uuid::Uuid;

use tally_domain::{
    invoice_sequence, AdvancePayment, ChargeCategory, ChargeInvoice, GeneratedChargeInstance,
    InvoicePayment, RecurringChargeDefinition,
};
use tally_engine::{ChargeTx, CoreError, DueCandidate};

use crate::{
    rows::{
        RawAdvance, RawCategory, RawDefinition, RawInstance, RawInvoice, RawPayment,
        ADVANCE_COLUMNS, CATEGORY_COLUMNS, DEFINITION_COLUMNS, INSTANCE_COLUMNS,
        INVOICE_COLUMNS, PAYMENT_COLUMNS,
    },
    SqlResultExt,
};

/// [`ChargeTx`] over an open SQLite transaction.
pub(crate) struct SqliteTx<'a> {
    pub conn: &'a Connection,
}

fn corrupt(table: &'static str) -> impl Fn(String) -> CoreError {
    move |reason| CoreError::Storage(format!("corrupt {table} row: {reason}"))
}

fn opt_text<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|value| value.to_string())
}

impl SqliteTx<'_> {
    fn query_all<R, T, P>(
        &self,
        sql: &str,
        params: P,
        from_row: fn(&Row<'_>) -> rusqlite::Result<R>,
        decode: fn(R) -> Result<T, String>,
        table: &'static str,
    ) -> Result<Vec<T>, CoreError>
    where
        P: Params,
    {
        let mut stmt = self.conn.prepare(sql).sql()?;
        let raws = stmt
            .query_map(params, from_row)
            .sql()?
            .collect::<rusqlite::Result<Vec<R>>>()
            .sql()?;
        raws.into_iter()
            .map(|raw| decode(raw).map_err(corrupt(table)))
            .collect()
    }

    fn query_one<R, T, P>(
        &self,
        sql: &str,
        params: P,
        from_row: fn(&Row<'_>) -> rusqlite::Result<R>,
        decode: fn(R) -> Result<T, String>,
        table: &'static str,
    ) -> Result<Option<T>, CoreError>
    where
        P: Params,
    {
        self.conn
            .query_row(sql, params, from_row)
            .optional()
            .sql()?
            .map(|raw| decode(raw).map_err(corrupt(table)))
            .transpose()
    }

    fn write_definition(
        &self,
        sql: &str,
        definition: &RecurringChargeDefinition,
    ) -> Result<usize, CoreError> {
        self.conn
            .execute(
                sql,
                params![
                    definition.id.to_string(),
                    definition.title,
                    definition.amount.to_string(),
                    definition.rule.recurrence_type.as_str(),
                    i64::from(definition.rule.recurrence_interval),
                    definition.start_date.to_string(),
                    opt_text(definition.end_date),
                    opt_text(definition.next_run_date),
                    definition.status.as_str(),
                    definition.category_id.to_string(),
                    definition.notes,
                    definition.created_by.to_string(),
                    definition.created_at.to_rfc3339(),
                    definition.updated_at.to_rfc3339(),
                ],
            )
            .sql()
    }

    fn write_invoice(&self, sql: &str, invoice: &ChargeInvoice) -> Result<usize, CoreError> {
        self.conn
            .execute(
                sql,
                params![
                    invoice.id.to_string(),
                    invoice.instance_id.to_string(),
                    opt_text(invoice.definition_id),
                    invoice.invoice_no,
                    invoice.status.as_str(),
                    invoice.invoice_date.to_string(),
                    invoice.due_date.to_string(),
                    invoice.amount.to_string(),
                    invoice.currency,
                    invoice.notes,
                    opt_text(invoice.paid_at),
                    invoice.created_by.to_string(),
                    invoice.created_at.to_rfc3339(),
                ],
            )
            .sql()
    }
}

impl ChargeTx for SqliteTx<'_> {
    fn category(&self, id: Uuid) -> Result<Option<ChargeCategory>, CoreError> {
        self.query_one(
            &format!("SELECT {CATEGORY_COLUMNS} FROM charge_categories WHERE id = ?1"),
            params![id.to_string()],
            RawCategory::from_row,
            RawCategory::decode,
            "category",
        )
    }

    fn categories(&self) -> Result<Vec<ChargeCategory>, CoreError> {
        self.query_all(
            &format!("SELECT {CATEGORY_COLUMNS} FROM charge_categories ORDER BY lower(name)"),
            params![],
            RawCategory::from_row,
            RawCategory::decode,
            "category",
        )
    }

    fn insert_category(&mut self, category: &ChargeCategory) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO charge_categories (id, name, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    category.id.to_string(),
                    category.name,
                    category.status.as_str(),
                    category.created_at.to_rfc3339(),
                ],
            )
            .sql()?;
        Ok(())
    }

    fn update_category(&mut self, category: &ChargeCategory) -> Result<(), CoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE charge_categories SET name = ?2, status = ?3 WHERE id = ?1",
                params![
                    category.id.to_string(),
                    category.name,
                    category.status.as_str()
                ],
            )
            .sql()?;
        if changed == 0 {
            return Err(CoreError::CategoryNotFound(category.id));
        }
        Ok(())
    }

    fn definition(&self, id: Uuid) -> Result<Option<RecurringChargeDefinition>, CoreError> {
        self.query_one(
            &format!("SELECT {DEFINITION_COLUMNS} FROM recurring_charges WHERE id = ?1"),
            params![id.to_string()],
            RawDefinition::from_row,
            RawDefinition::decode,
            "definition",
        )
    }

    /// Rows that no longer decode are left out of the listing and logged.
    fn definitions(&self) -> Result<Vec<RecurringChargeDefinition>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {DEFINITION_COLUMNS} FROM recurring_charges ORDER BY id"
            ))
            .sql()?;
        let raws = stmt
            .query_map(params![], RawDefinition::from_row)
            .sql()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql()?;

        let mut definitions = Vec::with_capacity(raws.len());
        for raw in raws {
            let raw_id = raw.id.clone();
            match raw.decode() {
                Ok(definition) => definitions.push(definition),
                Err(reason) => warn!(id = %raw_id, %reason, "unreadable definition row left out"),
            }
        }
        Ok(definitions)
    }

    fn due_definitions(
        &self,
        run_until: NaiveDate,
        only: Option<Uuid>,
    ) -> Result<Vec<DueCandidate>, CoreError> {
        let sql = format!(
            "SELECT {DEFINITION_COLUMNS} FROM recurring_charges \
             WHERE status = 'active' AND next_run_date IS NOT NULL AND next_run_date <= ?1 \
             AND (?2 IS NULL OR id = ?2) \
             ORDER BY next_run_date, id"
        );
        let mut stmt = self.conn.prepare(&sql).sql()?;
        let raws = stmt
            .query_map(
                params![run_until.to_string(), opt_text(only)],
                RawDefinition::from_row,
            )
            .sql()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql()?;

        Ok(raws
            .into_iter()
            .map(|raw| {
                let raw_id = raw.id.clone();
                match raw.decode() {
                    Ok(definition) => DueCandidate::Ready(definition),
                    Err(reason) => DueCandidate::Malformed {
                        id: raw_id.parse().unwrap_or_else(|_| Uuid::nil()),
                        reason,
                    },
                }
            })
            .collect())
    }

    fn insert_definition(
        &mut self,
        definition: &RecurringChargeDefinition,
    ) -> Result<(), CoreError> {
        self.write_definition(
            "INSERT INTO recurring_charges (id, title, amount, recurrence_type, \
             recurrence_interval, start_date, end_date, next_run_date, status, category_id, \
             notes, created_by, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            definition,
        )?;
        Ok(())
    }

    fn update_definition(
        &mut self,
        definition: &RecurringChargeDefinition,
    ) -> Result<(), CoreError> {
        let changed = self.write_definition(
            "UPDATE recurring_charges SET title = ?2, amount = ?3, recurrence_type = ?4, \
             recurrence_interval = ?5, start_date = ?6, end_date = ?7, next_run_date = ?8, \
             status = ?9, category_id = ?10, notes = ?11, created_by = ?12, created_at = ?13, \
             updated_at = ?14 WHERE id = ?1",
            definition,
        )?;
        if changed == 0 {
            return Err(CoreError::DefinitionNotFound(definition.id));
        }
        Ok(())
    }

    fn instance_for_cycle(
        &self,
        definition_id: Uuid,
        charge_date: NaiveDate,
    ) -> Result<Option<GeneratedChargeInstance>, CoreError> {
        self.query_one(
            &format!(
                "SELECT {INSTANCE_COLUMNS} FROM charge_instances \
                 WHERE definition_id = ?1 AND charge_date = ?2"
            ),
            params![definition_id.to_string(), charge_date.to_string()],
            RawInstance::from_row,
            RawInstance::decode,
            "instance",
        )
    }

    fn instances_for_definition(
        &self,
        definition_id: Uuid,
    ) -> Result<Vec<GeneratedChargeInstance>, CoreError> {
        self.query_all(
            &format!(
                "SELECT {INSTANCE_COLUMNS} FROM charge_instances \
                 WHERE definition_id = ?1 ORDER BY charge_date"
            ),
            params![definition_id.to_string()],
            RawInstance::from_row,
            RawInstance::decode,
            "instance",
        )
    }

    fn insert_instance(&mut self, instance: &GeneratedChargeInstance) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO charge_instances (id, definition_id, title, amount, charge_date, \
                 category_id, note, created_by, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    instance.id.to_string(),
                    opt_text(instance.definition_id),
                    instance.title,
                    instance.amount.to_string(),
                    instance.charge_date.to_string(),
                    instance.category_id.to_string(),
                    instance.note,
                    instance.created_by.to_string(),
                    instance.created_at.to_rfc3339(),
                ],
            )
            .sql()?;
        Ok(())
    }

    fn invoice(&self, id: Uuid) -> Result<Option<ChargeInvoice>, CoreError> {
        self.query_one(
            &format!("SELECT {INVOICE_COLUMNS} FROM charge_invoices WHERE id = ?1"),
            params![id.to_string()],
            RawInvoice::from_row,
            RawInvoice::decode,
            "invoice",
        )
    }

    fn invoice_for_instance(&self, instance_id: Uuid) -> Result<Option<ChargeInvoice>, CoreError> {
        self.query_one(
            &format!("SELECT {INVOICE_COLUMNS} FROM charge_invoices WHERE instance_id = ?1"),
            params![instance_id.to_string()],
            RawInvoice::from_row,
            RawInvoice::decode,
            "invoice",
        )
    }

    fn invoices(&self, definition_id: Option<Uuid>) -> Result<Vec<ChargeInvoice>, CoreError> {
        self.query_all(
            &format!(
                "SELECT {INVOICE_COLUMNS} FROM charge_invoices \
                 WHERE (?1 IS NULL OR definition_id = ?1) \
                 ORDER BY invoice_date DESC, invoice_no DESC"
            ),
            params![opt_text(definition_id)],
            RawInvoice::from_row,
            RawInvoice::decode,
            "invoice",
        )
    }

    fn last_invoice_sequence(&self, prefix: &str, year: i32) -> Result<u32, CoreError> {
        let pattern = format!("{prefix}-{year}-%");
        let mut stmt = self
            .conn
            .prepare("SELECT invoice_no FROM charge_invoices WHERE invoice_no LIKE ?1")
            .sql()?;
        let numbers = stmt
            .query_map(params![pattern], |row| row.get::<_, String>(0))
            .sql()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .sql()?;
        Ok(numbers
            .iter()
            .filter_map(|number| invoice_sequence(prefix, year, number))
            .max()
            .unwrap_or(0))
    }

    fn insert_invoice(&mut self, invoice: &ChargeInvoice) -> Result<(), CoreError> {
        self.write_invoice(
            "INSERT INTO charge_invoices (id, instance_id, definition_id, invoice_no, status, \
             invoice_date, due_date, amount, currency, notes, paid_at, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            invoice,
        )?;
        Ok(())
    }

    fn update_invoice(&mut self, invoice: &ChargeInvoice) -> Result<(), CoreError> {
        let changed = self.write_invoice(
            "UPDATE charge_invoices SET instance_id = ?2, definition_id = ?3, invoice_no = ?4, \
             status = ?5, invoice_date = ?6, due_date = ?7, amount = ?8, currency = ?9, \
             notes = ?10, paid_at = ?11, created_by = ?12, created_at = ?13 WHERE id = ?1",
            invoice,
        )?;
        if changed == 0 {
            return Err(CoreError::InvoiceNotFound(invoice.id));
        }
        Ok(())
    }

    fn payments_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<InvoicePayment>, CoreError> {
        self.query_all(
            &format!(
                "SELECT {PAYMENT_COLUMNS} FROM invoice_payments \
                 WHERE invoice_id = ?1 ORDER BY paid_at, created_at"
            ),
            params![invoice_id.to_string()],
            RawPayment::from_row,
            RawPayment::decode,
            "payment",
        )
    }

    fn insert_payment(&mut self, payment: &InvoicePayment) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO invoice_payments (id, invoice_id, method, kind, amount, paid_at, \
                 reference, note, created_by, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    payment.id.to_string(),
                    payment.invoice_id.to_string(),
                    payment.method.as_str(),
                    payment.kind.as_str(),
                    payment.amount.to_string(),
                    payment.paid_at.to_string(),
                    payment.reference,
                    payment.note,
                    payment.created_by.to_string(),
                    payment.created_at.to_rfc3339(),
                ],
            )
            .sql()?;
        Ok(())
    }

    fn advances_for_definition(
        &self,
        definition_id: Uuid,
    ) -> Result<Vec<AdvancePayment>, CoreError> {
        self.query_all(
            &format!(
                "SELECT {ADVANCE_COLUMNS} FROM advance_payments \
                 WHERE definition_id = ?1 ORDER BY paid_at DESC, created_at DESC"
            ),
            params![definition_id.to_string()],
            RawAdvance::from_row,
            RawAdvance::decode,
            "advance",
        )
    }

    fn insert_advance(&mut self, advance: &AdvancePayment) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO advance_payments (id, definition_id, method, amount, paid_at, \
                 reference, note, created_by, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    advance.id.to_string(),
                    advance.definition_id.to_string(),
                    advance.method.as_str(),
                    advance.amount.to_string(),
                    advance.paid_at.to_string(),
                    advance.reference,
                    advance.note,
                    advance.created_by.to_string(),
                    advance.created_at.to_rfc3339(),
                ],
            )
            .sql()?;
        Ok(())
    }
}
