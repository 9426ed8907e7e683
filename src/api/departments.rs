use log::info;
use mongodb::bson::doc;
use rocket::{http::Status, response::status::Created, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            department::{DepartmentDescription, DepartmentSpec},
        },
        common::role::Role,
        db::{
            department::{Department, NewDepartment},
            election::Election,
            user::User,
        },
        mongodb::{inserted_id, is_duplicate_key_error, Coll, Id},
    },
};

use super::common::{ensure_no_dependants, find_by_id, find_in_order};

pub fn routes() -> Vec<Route> {
    routes![
        list_departments,
        create_department,
        get_department,
        update_department,
        delete_department,
    ]
}

#[get("/api/admin/departments")]
async fn list_departments(
    _token: AuthToken<Admin>,
    departments: Coll<Department>,
    users: Coll<User>,
    elections: Coll<Election>,
) -> Result<Json<Vec<DepartmentDescription>>> {
    let mut descriptions = Vec::new();
    for department in find_in_order(&departments, None).await? {
        descriptions.push(describe(department, &users, &elections).await?);
    }
    Ok(Json(descriptions))
}

#[post("/api/admin/departments", data = "<spec>", format = "json")]
async fn create_department(
    _token: AuthToken<Admin>,
    spec: Json<DepartmentSpec>,
    new_departments: Coll<NewDepartment>,
    departments: Coll<Department>,
) -> Result<Created<Json<DepartmentDescription>>> {
    let department = NewDepartment::try_from(spec.0)?;
    let result = new_departments
        .insert_one(&department, None)
        .await
        .map_err(|e| duplicate_name(e, &department.name))?;
    let id = inserted_id(result);
    info!("Created department {id} ({})", department.name);

    let department = find_by_id(&departments, id, "Department").await?;
    Ok(Created::new(uri!(get_department(id)).to_string())
        .body(Json(DepartmentDescription::new(department, 0, 0))))
}

#[get("/api/admin/departments/<department_id>")]
async fn get_department(
    _token: AuthToken<Admin>,
    department_id: Id,
    departments: Coll<Department>,
    users: Coll<User>,
    elections: Coll<Election>,
) -> Result<Json<DepartmentDescription>> {
    let department = find_by_id(&departments, department_id, "Department").await?;
    Ok(Json(describe(department, &users, &elections).await?))
}

#[put("/api/admin/departments/<department_id>", data = "<spec>", format = "json")]
async fn update_department(
    _token: AuthToken<Admin>,
    department_id: Id,
    spec: Json<DepartmentSpec>,
    new_departments: Coll<NewDepartment>,
    departments: Coll<Department>,
    users: Coll<User>,
    elections: Coll<Election>,
) -> Result<Json<DepartmentDescription>> {
    let department = NewDepartment::try_from(spec.0)?;
    let result = new_departments
        .replace_one(department_id.as_doc(), &department, None)
        .await
        .map_err(|e| duplicate_name(e, &department.name))?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Department {department_id}")));
    }
    info!("Updated department {department_id}");

    let department = find_by_id(&departments, department_id, "Department").await?;
    Ok(Json(describe(department, &users, &elections).await?))
}

#[delete("/api/admin/departments/<department_id>")]
async fn delete_department(
    _token: AuthToken<Admin>,
    department_id: Id,
    departments: Coll<Department>,
    users: Coll<User>,
    elections: Coll<Election>,
) -> Result<Status> {
    let department = find_by_id(&departments, department_id, "Department").await?;
    let (students, election_count) = dependant_counts(department.id, &users, &elections).await?;
    ensure_no_dependants(
        "department",
        &[
            (students, "student", "students"),
            (election_count, "election", "elections"),
        ],
    )?;

    departments.delete_one(department_id.as_doc(), None).await?;
    info!("Deleted department {department_id}");
    Ok(Status::NoContent)
}

async fn dependant_counts(
    department_id: Id,
    users: &Coll<User>,
    elections: &Coll<Election>,
) -> Result<(u64, u64)> {
    let students = users
        .count_documents(
            doc! { "department_id": department_id, "role": Role::Student },
            None,
        )
        .await?;
    let election_count = elections
        .count_documents(doc! { "department_id": department_id }, None)
        .await?;
    Ok((students, election_count))
}

async fn describe(
    department: Department,
    users: &Coll<User>,
    elections: &Coll<Election>,
) -> Result<DepartmentDescription> {
    let (students, election_count) = dependant_counts(department.id, users, elections).await?;
    Ok(DepartmentDescription::new(department, students, election_count))
}

fn duplicate_name(err: mongodb::error::Error, name: &str) -> Error {
    if is_duplicate_key_error(&err) {
        Error::conflict(format!("A department named '{name}' already exists"))
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::ContentType,
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use super::*;
    use crate::error::ErrorBody;
    use crate::model::{
        db::{election::NewElection, user::NewUser},
    };

    async fn create(client: &Client, spec: &DepartmentSpec) -> (Status, String) {
        let response = client
            .post(uri!(create_department))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        (response.status(), response.into_string().await.unwrap())
    }

    #[backend_test(admin)]
    async fn create_and_list(client: Client) {
        let (status, body) = create(&client, &DepartmentSpec::example()).await;
        assert_eq!(Status::Created, status);
        let created: DepartmentDescription = serde_json::from_str(&body).unwrap();
        assert_eq!(created.name, "Computer Science");
        assert_eq!(created.code.as_deref(), Some("CS"));

        let response = client.get(uri!(list_departments)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<DepartmentDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[backend_test(admin)]
    async fn duplicate_names_conflict(client: Client) {
        create(&client, &DepartmentSpec::example()).await;
        let (status, body) = create(&client, &DepartmentSpec::example()).await;
        assert_eq!(Status::Conflict, status);
        let error: ErrorBody = serde_json::from_str(&body).unwrap();
        assert!(error.error.contains("Computer Science"));
    }

    #[backend_test(admin)]
    async fn blank_names_rejected(client: Client) {
        let spec = DepartmentSpec {
            name: " ".to_string(),
            code: None,
        };
        let (status, _) = create(&client, &spec).await;
        assert_eq!(Status::BadRequest, status);
    }

    #[backend_test(admin)]
    async fn update_renames(client: Client) {
        let (_, body) = create(&client, &DepartmentSpec::example()).await;
        let created: DepartmentDescription = serde_json::from_str(&body).unwrap();
        let id: Id = created.id.into();

        let spec = DepartmentSpec {
            name: "Computing".to_string(),
            code: Some("COMP".to_string()),
        };
        let response = client
            .put(uri!(update_department(id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let updated: DepartmentDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Computing");

        let response = client
            .put(uri!(update_department(Id::new())))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn delete_guarded_by_students_and_elections(client: Client, db: Database) {
        let departments = Coll::<NewDepartment>::from_db(&db);
        let department_id = inserted_id(
            departments
                .insert_one(NewDepartment::example2(), None)
                .await
                .unwrap(),
        );

        // A student blocks deletion.
        let student_id = inserted_id(
            Coll::<NewUser>::from_db(&db)
                .insert_one(NewUser::student_example(Some(department_id)), None)
                .await
                .unwrap(),
        );
        let response = client
            .delete(uri!(delete_department(department_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        // So does an election.
        Coll::<User>::from_db(&db)
            .delete_one(student_id.as_doc(), None)
            .await
            .unwrap();
        let election_id = inserted_id(
            Coll::<NewElection>::from_db(&db)
                .insert_one(NewElection::running_example(department_id, Id::new()), None)
                .await
                .unwrap(),
        );
        let response = client
            .delete(uri!(delete_department(department_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        assert!(departments
            .find_one(department_id.as_doc(), None)
            .await
            .unwrap()
            .is_some());

        // Once both are gone, the department can go too.
        Coll::<Election>::from_db(&db)
            .delete_one(election_id.as_doc(), None)
            .await
            .unwrap();
        let response = client
            .delete(uri!(delete_department(department_id)))
            .dispatch()
            .await;
        assert_eq!(Status::NoContent, response.status());
        assert!(departments
            .find_one(department_id.as_doc(), None)
            .await
            .unwrap()
            .is_none());
    }

    #[backend_test(voter)]
    async fn students_forbidden(client: Client) {
        let response = client.get(uri!(list_departments)).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test]
    async fn anonymous_unauthorized(client: Client) {
        let response = client.get(uri!(list_departments)).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
