use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core department data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentCore {
    pub name: String,
    /// Optional short code, e.g. "CS".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A department without an ID.
pub type NewDepartment = DepartmentCore;

/// A department from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub department: DepartmentCore,
}

impl Deref for Department {
    type Target = DepartmentCore;

    fn deref(&self) -> &Self::Target {
        &self.department
    }
}

impl DerefMut for Department {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.department
    }
}
