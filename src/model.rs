use crate::foundation::core::{EncodedImage, ItemId};

/// One before/after pair produced by a single restoration call.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorationItem {
    pub id: ItemId,
    #[serde(rename = "originalUrl")]
    pub original: EncodedImage,
    #[serde(rename = "restoredUrl")]
    pub restored: EncodedImage,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
}

/// The signed-in account.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub is_subscribed: bool,
}

impl User {
    /// Fresh account created by the sign-in flow.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_subscribed: false,
        }
    }
}

/// Restorations, newest first.
///
/// The list only grows: items are prepended and never removed or edited.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct History(Vec<RestorationItem>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<RestorationItem>) -> Self {
        Self(items)
    }

    /// Insert at position 0.
    pub fn prepend(&mut self, item: RestorationItem) {
        self.0.insert(0, item);
    }

    pub fn items(&self) -> &[RestorationItem] {
        &self.0
    }

    pub fn newest(&self) -> Option<&RestorationItem> {
        self.0.first()
    }

    pub fn get(&self, id: &ItemId) -> Option<&RestorationItem> {
        self.0.iter().find(|item| &item.id == id)
    }

    pub fn contains_id(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
