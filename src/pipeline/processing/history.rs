use std::collections::HashMap;

use crate::domain::{EmployeeFundKey, FeedbackRecord, IdentityKey};

/// Read-only historical extract, indexed for the per-record lookups of the
/// duration and override stages.
///
/// Rows with a blank identity part are kept but never indexed, so they can
/// never be matched.
pub struct HistoryIndex {
    records: Vec<FeedbackRecord>,
    by_identity: HashMap<IdentityKey, Vec<usize>>,
    by_employee_fund: HashMap<EmployeeFundKey, Vec<usize>>,
}

impl HistoryIndex {
    pub fn build(records: Vec<FeedbackRecord>) -> Self {
        let mut by_identity: HashMap<IdentityKey, Vec<usize>> = HashMap::new();
        let mut by_employee_fund: HashMap<EmployeeFundKey, Vec<usize>> = HashMap::new();

        for (idx, record) in records.iter().enumerate() {
            if let Some(key) = record.identity_key() {
                by_employee_fund
                    .entry(key.employee_fund.clone())
                    .or_default()
                    .push(idx);
                by_identity.entry(key).or_default().push(idx);
            }
        }

        Self {
            records,
            by_identity,
            by_employee_fund,
        }
    }

    fn resolve<'a>(&'a self, hits: Option<&'a Vec<usize>>) -> impl Iterator<Item = &'a FeedbackRecord> + 'a {
        hits.into_iter()
            .flat_map(|idxs| idxs.iter())
            .map(move |&idx| &self.records[idx])
    }

    /// Historical rows sharing all five identity parts
    pub fn same_identity<'a>(&'a self, key: &IdentityKey) -> impl Iterator<Item = &'a FeedbackRecord> + 'a {
        self.resolve(self.by_identity.get(key))
    }

    /// Historical rows for the same employee and fund, any error code
    pub fn same_employee_fund<'a>(
        &'a self,
        key: &EmployeeFundKey,
    ) -> impl Iterator<Item = &'a FeedbackRecord> + 'a {
        self.resolve(self.by_employee_fund.get(key))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
