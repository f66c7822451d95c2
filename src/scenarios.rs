//! Built-in scenario catalog
//!
//! Each scenario is one workflow against the EduShareQA API, expressed as
//! data. The register/bootstrap/login prefix they share lives in
//! [`admin_session`] and [`actor_session`].
//!
//! Resource upload goes through `/student/resources` for teachers too; that is
//! the path the backend exposes for uploads regardless of role.

use crate::fixture::Role;
use crate::scenario::{
    Assertion, Expectation, FailureExpectation, RequestTemplate, Scenario, ScenarioStep,
};
use serde_json::json;

/// Message the backend gives for an unknown course id
pub const MISSING_COURSE_MESSAGE: &str = "课程不存在";

/// Registers the run's admin, promotes it via the side channel, logs it in
pub fn admin_session() -> Vec<ScenarioStep> {
    vec![
        ScenarioStep::register(Role::Admin),
        ScenarioStep::bootstrap_admin().after("register_admin"),
        ScenarioStep::login(Role::Admin).after("bootstrap_admin"),
    ]
}

/// Registers and logs in the run's identity for `role`
pub fn actor_session(role: Role) -> Vec<ScenarioStep> {
    let register = ScenarioStep::register(role);
    let login = ScenarioStep::login(role).after(&register.name);
    vec![register, login]
}

pub fn all() -> Vec<Scenario> {
    vec![
        course_flow(),
        teacher_admin(),
        upload_boundary(),
        notifications(),
        teacher_dashboard(),
        question_search(),
    ]
}

pub fn find(name: &str) -> Option<Scenario> {
    all().into_iter().find(|s| s.name == name)
}

pub fn names() -> Vec<&'static str> {
    all().iter().map(|s| s.name).collect()
}

/// Course creation through question answering, across all three roles
pub fn course_flow() -> Scenario {
    let mut steps = admin_session();
    steps.extend(actor_session(Role::Teacher));
    steps.extend(actor_session(Role::Student));
    steps.extend([
        ScenarioStep::call(
            "teacher_profile",
            Role::Teacher,
            RequestTemplate::get("/profile/me"),
        )
        .extract("teacher_id", "/data/id"),
        ScenarioStep::call(
            "create_course",
            Role::Admin,
            RequestTemplate::post("/admin/courses").json(json!({
                "name": "Intro to CS {{suffix}}",
                "code": "CS101_{{suffix}}",
                "description": "Basic CS concepts",
                "faculty": "Computer Science",
                "teacherIds": ["{{teacher_id}}"]
            })),
        )
        .extract("course_id", "/data/id"),
        ScenarioStep::call(
            "upload_resource",
            Role::Teacher,
            RequestTemplate::post("/student/resources")
                .file(
                    "file",
                    "test.txt",
                    "text/plain",
                    "This is a test resource content",
                )
                .metadata(json!({
                    "title": "Syllabus",
                    "summary": "Course syllabus",
                    "courseId": "{{course_id}}",
                    "visibility": "PUBLIC"
                })),
        )
        .extract("resource_id", "/data/id"),
        ScenarioStep::call(
            "list_my_resources",
            Role::Teacher,
            RequestTemplate::get("/student/resources/my"),
        )
        .after("upload_resource")
        .assert(Assertion::present("/data/items")),
        ScenarioStep::call(
            "ask_question",
            Role::Student,
            RequestTemplate::post("/student/questions").metadata(json!({
                "title": "What is a variable?",
                "content": "I don't understand variables.",
                "courseId": "{{course_id}}"
            })),
        )
        .extract("question_id", "/data/id"),
        ScenarioStep::call(
            "search_course_questions",
            Role::Student,
            RequestTemplate::get("/student/questions")
                .query("courseId", "{{course_id}}")
                .query("page", "1")
                .query("pageSize", "5"),
        )
        .after("ask_question")
        .assert(Assertion::present("/data/total")),
        ScenarioStep::call(
            "answer_question",
            Role::Teacher,
            RequestTemplate::post("/teacher/answers").metadata(json!({
                "content": "A variable is a storage location.",
                "questionId": "{{question_id}}"
            })),
        ),
    ]);

    Scenario {
        name: "course_flow",
        description: "Admin creates a course, teacher uploads, student asks, teacher answers",
        steps,
    }
}

fn teacher_payload(username: Option<&str>) -> serde_json::Value {
    let mut payload = json!({
        "email": "managed_{{suffix}}@test.com",
        "fullName": "Managed Teacher",
        "password": "Password123!",
        "department": "CS",
        "title": "Professor",
        "bio": "Test Bio",
        "courseIds": []
    });
    if let Some(username) = username {
        payload["username"] = json!(username);
    }
    payload
}

/// Admin-side teacher management, including rejected payloads
pub fn teacher_admin() -> Scenario {
    let mut steps = admin_session();
    steps.extend([
        ScenarioStep::call(
            "create_teacher_without_username",
            Role::Admin,
            RequestTemplate::post("/admin/teachers").json(teacher_payload(None)),
        )
        .expect(Expectation::Failure(FailureExpectation::any())),
        ScenarioStep::call(
            "create_teacher_blank_username",
            Role::Admin,
            RequestTemplate::post("/admin/teachers").json(teacher_payload(Some(""))),
        )
        .expect(Expectation::Failure(FailureExpectation::same_as(
            "create_teacher_without_username",
        ))),
        ScenarioStep::call(
            "create_teacher",
            Role::Admin,
            RequestTemplate::post("/admin/teachers").json(json!({
                "username": "managed_{{suffix}}",
                "email": "managed_{{suffix}}@test.com",
                "fullName": "测试教师 {{suffix}}",
                "password": "Password123!",
                "department": "光电",
                "title": "教授",
                "bio": "简介\nMulti-line bio",
                "courseIds": []
            })),
        )
        .extract("managed_teacher_id", "/data/id"),
        ScenarioStep::call(
            "create_course",
            Role::Admin,
            RequestTemplate::post("/admin/courses").json(json!({
                "name": "Data Structures {{suffix}}",
                "code": "CS201_{{suffix}}",
                "description": "Lists, trees and graphs",
                "faculty": "Computer Science",
                "teacherIds": []
            })),
        )
        .extract("course_id", "/data/id"),
        ScenarioStep::call(
            "assign_course",
            Role::Admin,
            RequestTemplate::post("/admin/teachers/{{managed_teacher_id}}/courses")
                .json(json!({"courseIds": ["{{course_id}}"]})),
        ),
        ScenarioStep::call(
            "list_teachers",
            Role::Admin,
            RequestTemplate::get("/admin/teachers")
                .query("page", "1")
                .query("pageSize", "10"),
        )
        .after("create_teacher")
        .assert(Assertion::present("/data/items")),
        ScenarioStep::call(
            "list_courses",
            Role::Admin,
            RequestTemplate::get("/admin/courses")
                .query("page", "1")
                .query("pageSize", "10"),
        )
        .after("create_course")
        .assert(Assertion::present("/data/items")),
        ScenarioStep::call(
            "delete_teacher",
            Role::Admin,
            RequestTemplate::delete("/admin/teachers/{{managed_teacher_id}}"),
        )
        .after("assign_course")
        .after("list_teachers"),
    ]);

    Scenario {
        name: "teacher_admin",
        description: "Admin validates, creates, assigns and deletes a teacher",
        steps,
    }
}

/// Uploading against a course that does not exist must fail cleanly
pub fn upload_boundary() -> Scenario {
    let mut steps = actor_session(Role::Teacher);
    steps.push(
        ScenarioStep::call(
            "upload_to_missing_course",
            Role::Teacher,
            RequestTemplate::post("/student/resources")
                .file("file", "test.txt", "text/plain", "content")
                .metadata(json!({
                    "title": "Test Resource",
                    "summary": "Should fail",
                    "courseId": 99999,
                    "visibility": "PUBLIC"
                })),
        )
        .expect(Expectation::Failure(
            FailureExpectation::any().containing(MISSING_COURSE_MESSAGE),
        )),
    );

    Scenario {
        name: "upload_boundary",
        description: "Resource upload to a non-existent course is a business error, not a 500",
        steps,
    }
}

/// Marking notifications read never increases the unread count
pub fn notifications() -> Scenario {
    let mut steps = actor_session(Role::Student);
    steps.extend([
        ScenarioStep::call(
            "unread_before",
            Role::Student,
            RequestTemplate::get("/notifications/unread-count"),
        )
        .extract("unread_before", "/data"),
        ScenarioStep::call(
            "mark_all_read",
            Role::Student,
            RequestTemplate::post("/notifications/mark-read"),
        )
        .needs("unread_before"),
        ScenarioStep::call(
            "unread_after",
            Role::Student,
            RequestTemplate::get("/notifications/unread-count"),
        )
        .after("mark_all_read")
        .assert(Assertion::not_greater_than("/data", "unread_before")),
        ScenarioStep::call(
            "list_notifications",
            Role::Student,
            RequestTemplate::get("/notifications/list"),
        )
        .assert(Assertion::present("/data")),
    ]);

    Scenario {
        name: "notifications",
        description: "Student reads, clears and lists notifications",
        steps,
    }
}

pub fn teacher_dashboard() -> Scenario {
    let mut steps = actor_session(Role::Teacher);
    steps.extend([
        ScenarioStep::call(
            "dashboard_stats",
            Role::Teacher,
            RequestTemplate::get("/teacher/dashboard/stats"),
        )
        .assert(Assertion::present("/data/totalResources")),
        ScenarioStep::call(
            "teacher_unread_count",
            Role::Teacher,
            RequestTemplate::get("/notifications/unread-count"),
        )
        .assert(Assertion::present("/data")),
        ScenarioStep::call(
            "my_resources",
            Role::Teacher,
            RequestTemplate::get("/student/resources/my"),
        )
        .assert(Assertion::present("/data")),
    ]);

    Scenario {
        name: "teacher_dashboard",
        description: "Teacher reads dashboard statistics, unread notifications and own resources",
        steps,
    }
}

/// Searching by course lives in `course_flow`, which creates the course it
/// searches; this scenario relies on no pre-existing data
pub fn question_search() -> Scenario {
    let mut steps = actor_session(Role::Student);
    steps.extend([
        ScenarioStep::call(
            "search_by_keyword",
            Role::Student,
            RequestTemplate::get("/student/questions")
                .query("keyword", "问题")
                .query("page", "1")
                .query("pageSize", "5"),
        )
        .assert(Assertion::present("/data/items"))
        .assert(Assertion::present("/data/total")),
    ]);

    Scenario {
        name: "question_search",
        description: "Student searches questions by keyword with paging",
        steps,
    }
}
