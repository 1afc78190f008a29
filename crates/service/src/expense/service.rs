use std::sync::Arc;

use models::expense::{normalize_expense, Expense, ExpenseInput};
use models::id::generate_id;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::summary::{summarize, ExpenseSummary};
use crate::errors::ServiceError;
use crate::session::SessionProvider;
use crate::storage::{keys, CollectionStore};

/// Per-user CRUD over the shared expenses collection.
///
/// Every call is scoped to the user reported by the injected
/// [`SessionProvider`]; records of other users are never read or written.
/// Records are normalized on every read and normalized then validated
/// before every write.
#[derive(Clone)]
pub struct ExpenseService {
    store: Arc<CollectionStore>,
    session: Arc<dyn SessionProvider>,
}

fn owned_by(record: &ExpenseInput, user_id: &str) -> bool {
    record.user_id.as_deref() == Some(user_id)
}

fn is_record(record: &ExpenseInput, id: &str, user_id: &str) -> bool {
    record.id.as_deref() == Some(id) && owned_by(record, user_id)
}

/// Stamp ownership, assign a missing id, normalize and validate.
fn prepare(mut input: ExpenseInput, user_id: &str) -> Result<Expense, ServiceError> {
    if input.id.is_none() {
        input.id = Some(generate_id());
    }
    input.user_id = Some(user_id.to_string());
    Ok(Expense::try_from(normalize_expense(input))?)
}

impl ExpenseService {
    pub fn new(store: Arc<CollectionStore>, session: Arc<dyn SessionProvider>) -> Self {
        Self { store, session }
    }

    async fn current_user_id(&self) -> Option<String> {
        self.session.current_session().await.map(|s| s.user_id)
    }

    async fn require_user_id(&self) -> Result<String, ServiceError> {
        self.current_user_id().await.ok_or_else(ServiceError::no_session)
    }

    /// The current user's expenses; empty when nobody is logged in.
    pub async fn list_expenses(&self) -> Vec<Expense> {
        let Some(user_id) = self.current_user_id().await else {
            return Vec::new();
        };
        let records: Vec<ExpenseInput> = self.store.get_all(keys::EXPENSES).await;
        records
            .into_iter()
            .filter(|r| owned_by(r, &user_id))
            .filter_map(|r| {
                let id = r.id.clone();
                match Expense::try_from(normalize_expense(r)) {
                    Ok(e) => Some(e),
                    Err(e) => {
                        warn!(id = ?id, error = %e, "skipping unreadable expense");
                        None
                    }
                }
            })
            .collect()
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Expense> {
        if id.is_empty() {
            return None;
        }
        let found = self.list_expenses().await.into_iter().find(|e| e.id == id);
        if found.is_none() {
            debug!(id, "expense not found for current user");
        }
        found
    }

    /// # Examples
    /// ```
    /// use models::expense::ExpenseInput;
    /// use service::expense::ExpenseService;
    /// use service::session::FixedSession;
    /// use service::storage::{CollectionStore, KeyValueStore, MemoryBackend};
    /// use std::sync::Arc;
    /// let store = Arc::new(CollectionStore::new(KeyValueStore::new(Arc::new(MemoryBackend::new()))));
    /// let svc = ExpenseService::new(store, Arc::new(FixedSession::user("u1")));
    /// let input = ExpenseInput::default().with_date("2024-01-15").with_amount(9.999).with_category(" Food ");
    /// let created = tokio_test::block_on(svc.create(input)).unwrap();
    /// assert_eq!(created.amount, 10.0);
    /// assert_eq!(created.category, "Food");
    /// assert_eq!(created.user_id.as_deref(), Some("u1"));
    /// ```
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: ExpenseInput) -> Result<Expense, ServiceError> {
        let user_id = self.require_user_id().await?;
        let expense = prepare(input, &user_id)?;
        self.store.add_item(keys::EXPENSES, ExpenseInput::from(expense.clone())).await;
        info!(id = %expense.id, user_id = %user_id, "expense_created");
        Ok(expense)
    }

    /// Merge `partial` over the stored record. `id` and the owner cannot change.
    #[instrument(skip(self, partial))]
    pub async fn update(&self, id: &str, partial: ExpenseInput) -> Result<Expense, ServiceError> {
        let user_id = self.require_user_id().await?;
        if id.is_empty() {
            return Err(ServiceError::Validation("id is required".into()));
        }
        let updated = self
            .store
            .mutate(keys::EXPENSES, |records: &mut Vec<ExpenseInput>| {
                let slot = records
                    .iter_mut()
                    .find(|r| is_record(r, id, &user_id))
                    .ok_or_else(|| ServiceError::not_found("expense"))?;
                let mut merged = slot.clone().merge(partial);
                merged.id = Some(id.to_string());
                merged.user_id = Some(user_id.clone());
                let expense = Expense::try_from(normalize_expense(merged))?;
                *slot = ExpenseInput::from(expense.clone());
                Ok::<_, ServiceError>(expense)
            })
            .await?;
        info!(id, user_id = %user_id, "expense_updated");
        Ok(updated)
    }

    /// `Ok(false)` when `id` is empty or matches none of the current user's records.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<bool, ServiceError> {
        let user_id = self.require_user_id().await?;
        if id.is_empty() {
            return Ok(false);
        }
        let removed = self
            .store
            .mutate(keys::EXPENSES, |records: &mut Vec<ExpenseInput>| {
                let before = records.len();
                records.retain(|r| !is_record(r, id, &user_id));
                Ok::<_, ServiceError>(records.len() != before)
            })
            .await?;
        if removed {
            info!(id, user_id = %user_id, "expense_removed");
        }
        Ok(removed)
    }

    /// Replace the current user's expenses with `inputs`, leaving every other
    /// user's records untouched. Incoming `userId`s are overwritten.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn replace_all(&self, inputs: Vec<ExpenseInput>) -> Result<Vec<Expense>, ServiceError> {
        let user_id = self.require_user_id().await?;
        let mine = inputs
            .into_iter()
            .map(|input| prepare(input, &user_id))
            .collect::<Result<Vec<_>, _>>()?;
        let stored = mine.clone();
        self.store
            .mutate(keys::EXPENSES, |records: &mut Vec<ExpenseInput>| {
                records.retain(|r| !owned_by(r, &user_id));
                records.extend(stored.into_iter().map(ExpenseInput::from));
                Ok::<_, ServiceError>(())
            })
            .await?;
        info!(user_id = %user_id, count = mine.len(), "expenses_replaced");
        Ok(mine)
    }

    /// [`replace_all`](Self::replace_all) for an untyped JSON document, which must be an array.
    pub async fn replace_all_json(&self, doc: Value) -> Result<Vec<Expense>, ServiceError> {
        // the session check comes first, as in replace_all
        self.require_user_id().await?;
        let Value::Array(items) = doc else {
            return Err(ServiceError::Validation("expenses must be a list".into()));
        };
        let inputs = items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<ExpenseInput>(item)
                    .map_err(|e| ServiceError::Validation(format!("invalid expense: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.replace_all(inputs).await
    }

    /// Totals over the current user's expenses.
    pub async fn summary(&self) -> ExpenseSummary {
        summarize(&self.list_expenses().await)
    }
}
