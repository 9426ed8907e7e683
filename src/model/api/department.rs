use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::department::{Department, NewDepartment};

use super::id::ApiId;

/// A department as submitted by an admin, for creation or update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentSpec {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl TryFrom<DepartmentSpec> for NewDepartment {
    type Error = Error;

    fn try_from(spec: DepartmentSpec) -> Result<Self> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(Error::bad_request("Department name must not be empty"));
        }
        let code = spec
            .code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty());
        Ok(Self {
            name: name.to_string(),
            code,
        })
    }
}

/// A department with the number of students and elections attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentDescription {
    pub id: ApiId,
    pub name: String,
    pub code: Option<String>,
    pub student_count: u64,
    pub election_count: u64,
}

impl DepartmentDescription {
    pub fn new(department: Department, student_count: u64, election_count: u64) -> Self {
        Self {
            id: department.id.into(),
            name: department.department.name,
            code: department.department.code,
            student_count,
            election_count,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_required() {
        let spec = DepartmentSpec {
            name: "  Physics ".to_string(),
            code: Some(" ".to_string()),
        };
        let department = NewDepartment::try_from(spec).unwrap();
        assert_eq!(department.name, "Physics");
        assert_eq!(department.code, None);

        let blank = DepartmentSpec {
            name: "   ".to_string(),
            code: None,
        };
        assert!(NewDepartment::try_from(blank).is_err());
    }
}
