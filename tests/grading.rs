mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{Actor, TestApp};

async fn final_grade(t: &TestApp, actor: &Actor, student: Uuid, subject: Uuid) -> Result<(StatusCode, Value)> {
    t.get(&format!("/grades/final?student_id={student}&subject_id={subject}"), actor).await
}

#[tokio::test]
async fn final_grade_is_null_without_grades() -> Result<()> {
    let t = TestApp::new().await?;
    let director = t.user("directora", "Director").await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let subject = t.subject("Cálculo", None).await?;
    t.assignment(subject, 100.0, 5.0).await?;

    let (status, body) = final_grade(&t, &director, student.id, subject).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["final_grade"].is_null());
    assert!(body["approved"].is_null());

    Ok(())
}

#[tokio::test]
async fn single_full_weight_assignment_round_trips() -> Result<()> {
    let t = TestApp::new().await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let subject = t.subject("Cálculo", None).await?;
    let assignment = t.assignment(subject, 100.0, 5.0).await?;
    t.enroll(student.id, subject).await?;
    t.grade(student.id, assignment, subject, 4.0).await?;

    let (status, body) = final_grade(&t, &student, student.id, subject).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["final_grade"].as_f64(), Some(4.0));
    assert_eq!(body["approved"], true);

    Ok(())
}

#[tokio::test]
async fn partial_completion_is_not_renormalized() -> Result<()> {
    let t = TestApp::new().await?;
    let teacher = t.user("profe", "Profesor").await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let subject = t.subject("Cálculo", Some(teacher.id)).await?;
    let first = t.assignment(subject, 50.0, 5.0).await?;
    t.assignment(subject, 50.0, 5.0).await?;
    t.enroll(student.id, subject).await?;

    let (status, body) = t
        .post("/grades", &teacher, json!({"student_id": student.id, "assignment_id": first, "score": 5.0}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["subject_id"], subject.to_string());
    assert_eq!(body["graded_by"], teacher.id.to_string());

    let (status, body) = final_grade(&t, &teacher, student.id, subject).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["final_grade"].as_f64(), Some(2.5));
    assert_eq!(body["approved"], false);

    Ok(())
}

#[tokio::test]
async fn final_grade_is_scoped_by_role() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.user("profe", "Profesor").await?;
    let outsider = t.user("otro", "Profesor").await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let classmate = t.user("alumno2", "Estudiante").await?;
    let subject = t.subject("Cálculo", Some(owner.id)).await?;

    let (status, _) = final_grade(&t, &classmate, student.id, subject).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = final_grade(&t, &outsider, student.id, subject).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = final_grade(&t, &owner, student.id, subject).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = final_grade(&t, &owner, student.id, Uuid::new_v4()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn grade_writes_are_validated_and_owned() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.user("profe", "Profesor").await?;
    let outsider = t.user("otro", "Profesor").await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let stranger = t.user("alumno2", "Estudiante").await?;
    let subject = t.subject("Cálculo", Some(owner.id)).await?;
    let assignment = t.assignment(subject, 40.0, 5.0).await?;
    t.enroll(student.id, subject).await?;

    let grade = |student_id: Uuid, score: f64| json!({"student_id": student_id, "assignment_id": assignment, "score": score});

    let (status, _) = t.post("/grades", &owner, grade(student.id, 5.5)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = t.post("/grades", &owner, grade(student.id, -1.0)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.post("/grades", &outsider, grade(student.id, 4.0)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.post("/grades", &owner, grade(stranger.id, 4.0)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.post("/grades", &student, grade(student.id, 5.0)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = t.post("/grades", &owner, grade(student.id, 4.0)).await?;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let (status, _) = t.post("/grades", &owner, grade(student.id, 3.0)).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = created["id"].as_str().unwrap_or_default().to_string();
    let uri = format!("/grades/{id}");
    let (status, _) = t.put(&uri, &outsider, json!({"score": 1.0})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = t.put(&uri, &owner, json!({"score": 4.5, "feedback": "bien"})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["score"].as_f64(), Some(4.5));

    let (_, listed) = t.get("/grades", &student).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    let (status, _) = t.get(&format!("/grades?student_id={}", stranger.id), &student).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.delete(&uri, &outsider).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.delete(&uri, &owner).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn assignment_weights_are_capped_per_subject() -> Result<()> {
    let t = TestApp::new().await?;
    let teacher = t.user("profe", "Profesor").await?;
    let subject = t.subject("Cálculo", Some(teacher.id)).await?;

    let create = |weight: f64| json!({"subject_id": subject, "title": "Parcial", "weight": weight});

    let (status, first) = t.post("/assignments", &teacher, create(60.0)).await?;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["max_score"].as_f64(), Some(5.0));

    let (status, body) = t.post("/assignments", &teacher, create(50.0)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = t.post("/assignments", &teacher, create(40.0)).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t.post("/assignments", &teacher, create(120.0)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // an update may keep its own weight
    let id = first["id"].as_str().unwrap_or_default().to_string();
    let (status, body) = t
        .put(&format!("/assignments/{id}"), &teacher, json!({"weight": 60.0, "title": "Parcial 1"}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["title"], "Parcial 1");

    let (_, listed) = t.get(&format!("/subjects/{subject}/assignments"), &teacher).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(2));

    Ok(())
}

#[tokio::test]
async fn graded_assignments_cannot_be_deleted() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.user("profe", "Profesor").await?;
    let outsider = t.user("otro", "Profesor").await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let subject = t.subject("Cálculo", Some(owner.id)).await?;
    let graded = t.assignment(subject, 50.0, 5.0).await?;
    let ungraded = t.assignment(subject, 50.0, 5.0).await?;
    t.grade(student.id, graded, subject, 3.5).await?;

    let (status, body) = t.delete(&format!("/assignments/{graded}"), &owner).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["references"], json!({"grades": 1}));

    let (status, _) = t.delete(&format!("/assignments/{ungraded}"), &outsider).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.delete(&format!("/assignments/{ungraded}"), &owner).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(t.count("SELECT COUNT(1) FROM assignments WHERE subject_id = ?", subject).await?, 1);

    Ok(())
}

#[tokio::test]
async fn scores_are_bounded_by_the_assignment_max_score() -> Result<()> {
    let t = TestApp::new().await?;
    let teacher = t.user("profe", "Profesor").await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let subject = t.subject("Cálculo", Some(teacher.id)).await?;
    t.enroll(student.id, subject).await?;

    let quiz = json!({"subject_id": subject, "title": "Quiz", "weight": 100.0, "max_score": 1.0});
    let (status, assignment) = t.post("/assignments", &teacher, quiz).await?;
    assert_eq!(status, StatusCode::CREATED, "{assignment}");
    let assignment_id = assignment["id"].as_str().unwrap_or_default().to_string();

    let (status, body) = t
        .post("/grades", &teacher, json!({"student_id": student.id, "assignment_id": assignment_id, "score": 5.0}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, grade) = t
        .post("/grades", &teacher, json!({"student_id": student.id, "assignment_id": assignment_id, "score": 1.0}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{grade}");
    let grade_id = grade["id"].as_str().unwrap_or_default().to_string();

    let (status, _) = t.put(&format!("/grades/{grade_id}"), &teacher, json!({"score": 2.0})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = final_grade(&t, &teacher, student.id, subject).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["final_grade"].as_f64(), Some(5.0));

    Ok(())
}

#[tokio::test]
async fn max_score_is_capped_at_the_grade_scale() -> Result<()> {
    let t = TestApp::new().await?;
    let teacher = t.user("profe", "Profesor").await?;
    let subject = t.subject("Cálculo", Some(teacher.id)).await?;

    let exam = json!({"subject_id": subject, "title": "Examen", "weight": 50.0, "max_score": 10.0});
    let (status, body) = t.post("/assignments", &teacher, exam).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let assignment = t.assignment(subject, 50.0, 5.0).await?;
    let (status, _) = t
        .put(&format!("/assignments/{assignment}"), &teacher, json!({"max_score": 7.5}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn max_score_cannot_drop_below_recorded_grades() -> Result<()> {
    let t = TestApp::new().await?;
    let teacher = t.user("profe", "Profesor").await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let subject = t.subject("Cálculo", Some(teacher.id)).await?;
    let assignment = t.assignment(subject, 100.0, 5.0).await?;
    t.grade(student.id, assignment, subject, 4.0).await?;

    let uri = format!("/assignments/{assignment}");
    let (status, body) = t.put(&uri, &teacher, json!({"max_score": 3.0})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = t.put(&uri, &teacher, json!({"max_score": 4.0})).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["max_score"].as_f64(), Some(4.0));

    Ok(())
}

#[tokio::test]
async fn grade_ownership_falls_back_to_its_subject_when_the_assignment_is_gone() -> Result<()> {
    let t = TestApp::new().await?;
    let owner = t.user("profe", "Profesor").await?;
    let outsider = t.user("otro", "Profesor").await?;
    let student = t.user("alumno1", "Estudiante").await?;
    let subject = t.subject("Cálculo", Some(owner.id)).await?;
    let assignment = t.assignment(subject, 100.0, 5.0).await?;
    let grade = t.grade(student.id, assignment, subject, 3.0).await?;

    // rows left behind by data written with foreign keys disabled
    {
        let mut conn = t.pool.acquire().await?;
        sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *conn).await?;
        sqlx::query("DELETE FROM assignments WHERE id = ?")
            .bind(assignment)
            .execute(&mut *conn)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
    }
    assert_eq!(t.count("SELECT COUNT(1) FROM grades WHERE id = ?", grade).await?, 1);

    let uri = format!("/grades/{grade}");
    let (status, _) = t.delete(&uri, &outsider).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t.delete(&uri, &owner).await?;
    assert_eq!(status, StatusCode::NO_CONTENT, "{body}");
    assert_eq!(t.count("SELECT COUNT(1) FROM grades WHERE id = ?", grade).await?, 0);

    Ok(())
}
