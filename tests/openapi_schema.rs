use serde_json::Value;

#[test]
fn openapi_documents_grade_and_deletion_schemas() -> anyhow::Result<()> {
    // Build the OpenAPI document the same way the server does
    let doc = academic_records::docs::build_openapi(8000);
    let v = serde_json::to_value(&doc)?;

    let schemas = v
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
        .expect("components.schemas must exist");

    let grade_props = schemas
        .get("Grade")
        .and_then(|g| g.get("properties"))
        .and_then(Value::as_object)
        .expect("Grade schema must have properties");
    for k in ["score", "assignment_id", "subject_id", "graded_by"] {
        assert!(grade_props.contains_key(k), "OpenAPI Grade schema missing '{}'", k);
    }

    for name in ["DeletionSummary", "DependentReferences", "FinalGradeResponse", "User"] {
        assert!(schemas.contains_key(name), "missing schema {name}");
    }

    let servers = v.get("servers").and_then(Value::as_array).expect("servers");
    assert_eq!(servers[0]["url"], "http://localhost:8000");

    Ok(())
}
