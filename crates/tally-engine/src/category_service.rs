use uuid::Uuid;

use tally_domain::{Actor, CategoryStatus, ChargeCategory};

use crate::{
    policy::{Capability, Policy},
    storage::ChargeStore,
    time::Clock,
    CoreError,
};

pub const MAX_CATEGORY_NAME_LEN: usize = 255;

pub struct CategoryService;

impl CategoryService {
    /// Adds an active category with a name unique regardless of case.
    pub fn create<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        clock: &dyn Clock,
        name: &str,
    ) -> Result<ChargeCategory, CoreError> {
        Policy::authorize(actor, Capability::ManageCharges)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("category name is required".into()));
        }
        if name.chars().count() > MAX_CATEGORY_NAME_LEN {
            return Err(CoreError::Validation(format!(
                "category name exceeds {MAX_CATEGORY_NAME_LEN} characters"
            )));
        }
        let category = ChargeCategory::new(name, clock.now());
        store.transaction(|tx| {
            let taken = tx
                .categories()?
                .iter()
                .any(|existing| existing.name.to_lowercase() == name.to_lowercase());
            if taken {
                return Err(CoreError::Conflict(format!("category `{name}` already exists")));
            }
            tx.insert_category(&category)
        })?;
        tracing::info!(category = %category.id, name = %category.name, "category created");
        Ok(category)
    }

    pub fn set_status<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
        id: Uuid,
        status: CategoryStatus,
    ) -> Result<ChargeCategory, CoreError> {
        Policy::authorize(actor, Capability::ManageCharges)?;
        store.transaction(|tx| {
            let mut category = tx.category(id)?.ok_or(CoreError::CategoryNotFound(id))?;
            category.status = status;
            tx.update_category(&category)?;
            Ok(category)
        })
    }

    pub fn list<S: ChargeStore>(
        store: &mut S,
        actor: &Actor,
    ) -> Result<Vec<ChargeCategory>, CoreError> {
        Policy::authorize(actor, Capability::ViewCharges)?;
        store.read(|tx| tx.categories())
    }
}
