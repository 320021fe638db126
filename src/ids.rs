//! Canonical id sets for the bulk endpoints.
//!
//! `user_ids` may arrive as repeated query values (`?user_ids=a&user_ids=b`),
//! as one comma-joined value (`?user_ids=a,b`), or a mix of both. All forms
//! collapse into the same `IdSet` here so handlers never see the encoding.

/// Query key carrying the ids on `GET /users/` and `DELETE /users/`.
pub const USER_IDS_PARAM: &str = "user_ids";

/// Check that `id` can be addressed through an `IdSet`: non-empty, no comma,
/// no surrounding whitespace. Ids failing this would be split or trimmed by
/// the bulk endpoints and could never be looked up or deleted as stored.
pub fn check_record_id(id: &str) -> Result<(), &'static str> {
    if id.trim().is_empty() {
        return Err("user id must not be empty");
    }
    if id.contains(',') {
        return Err("user id must not contain ','");
    }
    if id.trim() != id {
        return Err("user id must not start or end with whitespace");
    }
    Ok(())
}

/// Ordered, de-duplicated set of record ids. Order is first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdSet(Vec<String>);

impl IdSet {
    /// Build from raw parameter values; each value may itself be comma-joined.
    /// Segments are trimmed and empty segments dropped.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = IdSet::default();
        for v in values {
            for seg in v.as_ref().split(',') {
                set.insert(seg.trim());
            }
        }
        set
    }

    /// Collect every `user_ids` value out of decoded query pairs.
    pub fn from_query_pairs(pairs: &[(String, String)]) -> Self {
        Self::from_values(
            pairs
                .iter()
                .filter(|(k, _)| k == USER_IDS_PARAM)
                .map(|(_, v)| v.as_str()),
        )
    }

    fn insert(&mut self, id: &str) {
        if id.is_empty() || self.contains(id) { return; }
        self.0.push(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool { self.0.iter().any(|x| x == id) }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }
}
