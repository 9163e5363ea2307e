use huddle_core::models::{Project, User};
use speculate2::speculate;

struct Team {
    project: Project,
    owner: User,
    admin: User,
    member: User,
}

speculate! {
    use huddle_core::db::Database;
    use huddle_core::directory::Directory;
    use huddle_core::models::*;
    use huddle_core::services::{ActivityLog, NotificationService, ProjectService, TaskService};
    use huddle_core::DomainError;
    use uuid::Uuid;

    fn setup_db() -> Database {
        let db = Database::open_memory().expect("Failed to create test database");
        db.migrate().expect("Failed to apply schema");
        db
    }

    fn register(db: &Database, name: &str, email: &str) -> User {
        Directory::new(db.clone())
            .register(RegisterUserInput { name: name.into(), email: email.into() })
            .expect("Failed to register user")
    }

    fn setup_team(db: &Database) -> Team {
        let owner = register(db, "Olive", "olive@example.com");
        let admin = register(db, "Ada", "ada@example.com");
        let member = register(db, "Mel", "mel@example.com");
        let projects = ProjectService::new(db.clone());
        let project = projects.create(owner.id, CreateProjectInput {
            name: "Apollo".into(), key: "APL".into(), description: None,
        }).expect("Failed to create project");
        projects.add_member(owner.id, project.id, admin.id, Role::Admin).unwrap();
        projects.add_member(owner.id, project.id, member.id, Role::Member).unwrap();
        Team { project, owner, admin, member }
    }

    fn create_task(db: &Database, team: &Team, title: &str) -> Task {
        TaskService::new(db.clone()).create(team.admin.id, team.project.id, CreateTaskInput {
            title: title.into(),
            description: None,
            priority: None,
            assigned_to: None,
            due_date: None,
        }).expect("Failed to create task")
    }

    fn direct_notifications(db: &Database, user: Uuid) -> Vec<Notification> {
        NotificationService::new(db.clone())
            .list(user, NotificationQuery::default())
            .expect("Failed to list notifications")
            .items
    }

    describe "task creation" {
        it "defaults to todo and medium priority" {
            let db = setup_db();
            let team = setup_team(&db);
            let task = create_task(&db, &team, "Ship it");

            assert_eq!(task.status, TaskStatus::Todo);
            assert_eq!(task.priority, TaskPriority::Medium);
            assert!(task.assigned_to.is_none());
        }

        it "is forbidden for non-members" {
            let db = setup_db();
            let team = setup_team(&db);
            let outsider = register(&db, "Out", "out@example.com");

            let result = TaskService::new(db.clone()).create(outsider.id, team.project.id,
                CreateTaskInput {
                    title: "Nope".into(), description: None, priority: None,
                    assigned_to: None, due_date: None,
                });
            assert!(matches!(result, Err(DomainError::Forbidden(_))));
        }

        it "notifies an initial assignee who is not the creator" {
            let db = setup_db();
            let team = setup_team(&db);
            let task = TaskService::new(db.clone()).create(team.admin.id, team.project.id,
                CreateTaskInput {
                    title: "Prepped".into(), description: None, priority: None,
                    assigned_to: Some(team.member.id), due_date: None,
                }).unwrap();

            assert_eq!(task.assignee_name.as_deref(), Some("Mel"));
            let inbox = direct_notifications(&db, team.member.id);
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].kind, NotificationKind::TaskAssigned);
            assert_eq!(inbox[0].task_id, Some(task.id));
        }
    }

    describe "status changes" {
        it "records the old and new status and notifies the assignee" {
            let db = setup_db();
            let team = setup_team(&db);
            let tasks = TaskService::new(db.clone());
            let task = create_task(&db, &team, "Ship it");
            tasks.assign(team.admin.id, task.id, Some(team.member.id)).unwrap();

            let updated = tasks.set_status(team.admin.id, task.id, TaskStatus::InProgress).unwrap();
            assert_eq!(updated.status, TaskStatus::InProgress);

            let activity = ActivityLog::new(db.clone())
                .query(team.owner.id, team.project.id, 50, 0)
                .unwrap();
            let change = activity.iter()
                .find(|e| e.kind == ActivityKind::TaskStatusChanged)
                .expect("status change should be logged");
            assert_eq!(change.meta["from_status"], "todo");
            assert_eq!(change.meta["to_status"], "in_progress");

            let inbox = direct_notifications(&db, team.member.id);
            assert!(inbox.iter().any(|n| n.kind == NotificationKind::TaskStatusChanged));
        }

        it "is a complete no-op when the status is unchanged" {
            let db = setup_db();
            let team = setup_team(&db);
            let tasks = TaskService::new(db.clone());
            let task = create_task(&db, &team, "Ship it");
            tasks.assign(team.admin.id, task.id, Some(team.member.id)).unwrap();

            let before = ActivityLog::new(db.clone())
                .query(team.owner.id, team.project.id, 50, 0)
                .unwrap()
                .len();
            let inbox_before = direct_notifications(&db, team.member.id).len();

            tasks.set_status(team.admin.id, task.id, TaskStatus::Todo).unwrap();

            let after = ActivityLog::new(db.clone())
                .query(team.owner.id, team.project.id, 50, 0)
                .unwrap()
                .len();
            assert_eq!(before, after);
            assert_eq!(direct_notifications(&db, team.member.id).len(), inbox_before);
        }

        it "lets a member update only their own task's status" {
            let db = setup_db();
            let team = setup_team(&db);
            let tasks = TaskService::new(db.clone());
            let task = create_task(&db, &team, "Ship it");

            let unassigned = tasks.set_status(team.member.id, task.id, TaskStatus::Done);
            assert!(matches!(unassigned, Err(DomainError::Forbidden(_))));

            tasks.assign(team.admin.id, task.id, Some(team.member.id)).unwrap();
            tasks.set_status(team.member.id, task.id, TaskStatus::Done).unwrap();
        }

        it "accepts the legacy completed spelling at the parse boundary" {
            assert_eq!(TaskStatus::from_str("completed"), Some(TaskStatus::Done));
            assert_eq!(TaskStatus::from_str("DONE"), Some(TaskStatus::Done));
            assert_eq!(TaskStatus::from_str("TODO"), Some(TaskStatus::Todo));
            assert_eq!(TaskStatus::from_str("bogus"), None);
            // Canonical value is what gets persisted.
            assert_eq!(TaskStatus::Done.as_str(), "done");
        }
    }

    describe "assignment" {
        it "snapshots the display name and suppresses self-assignment notices" {
            let db = setup_db();
            let team = setup_team(&db);
            let tasks = TaskService::new(db.clone());
            let task = create_task(&db, &team, "Ship it");

            // Admin assigns to member: one notification.
            let assigned = tasks.assign(team.admin.id, task.id, Some(team.member.id)).unwrap();
            assert_eq!(assigned.assignee_name.as_deref(), Some("Mel"));
            assert_eq!(direct_notifications(&db, team.member.id).len(), 1);

            // Member moves it back to themselves via unassign/reassign:
            // activity is recorded, but no new notification.
            tasks.assign(team.member.id, task.id, None).unwrap();
            tasks.assign(team.member.id, task.id, Some(team.member.id)).unwrap();
            assert_eq!(direct_notifications(&db, team.member.id).len(), 1);

            let activity = ActivityLog::new(db.clone())
                .query(team.owner.id, team.project.id, 50, 0)
                .unwrap();
            let assigns = activity.iter()
                .filter(|e| e.kind == ActivityKind::TaskAssigned)
                .count();
            let unassigns = activity.iter()
                .filter(|e| e.kind == ActivityKind::TaskUnassigned)
                .count();
            assert_eq!(assigns, 2);
            assert_eq!(unassigns, 1);
        }

        it "rejects assignees who are not project members" {
            let db = setup_db();
            let team = setup_team(&db);
            let outsider = register(&db, "Out", "out@example.com");
            let tasks = TaskService::new(db.clone());
            let task = create_task(&db, &team, "Ship it");

            let result = tasks.assign(team.admin.id, task.id, Some(outsider.id));
            assert!(matches!(result, Err(DomainError::Validation(_))));
            let ghost = tasks.assign(team.admin.id, task.id, Some(Uuid::new_v4()));
            assert!(matches!(ghost, Err(DomainError::Validation(_))));
        }
    }

    describe "edits and deletion" {
        it "updates fields without touching status or assignment" {
            let db = setup_db();
            let team = setup_team(&db);
            let tasks = TaskService::new(db.clone());
            let task = create_task(&db, &team, "Ship it");

            let updated = tasks.update(team.admin.id, task.id, UpdateTaskInput {
                title: Some("Ship it twice".into()),
                priority: Some(TaskPriority::Urgent),
                ..Default::default()
            }).unwrap();
            assert_eq!(updated.title, "Ship it twice");
            assert_eq!(updated.priority, TaskPriority::Urgent);
            assert_eq!(updated.status, TaskStatus::Todo);
        }

        it "forbids plain members from editing other people's tasks" {
            let db = setup_db();
            let team = setup_team(&db);
            let tasks = TaskService::new(db.clone());
            let task = create_task(&db, &team, "Ship it");

            let result = tasks.update(team.member.id, task.id, UpdateTaskInput {
                title: Some("Hijacked".into()),
                ..Default::default()
            });
            assert!(matches!(result, Err(DomainError::Forbidden(_))));
        }

        it "forbids plain members from deleting tasks" {
            let db = setup_db();
            let team = setup_team(&db);
            let tasks = TaskService::new(db.clone());
            let task = create_task(&db, &team, "Ship it");

            let result = tasks.delete(team.member.id, task.id);
            assert!(matches!(result, Err(DomainError::Forbidden(_))));

            tasks.delete(team.admin.id, task.id).unwrap();
            assert!(matches!(
                tasks.get(team.admin.id, task.id),
                Err(DomainError::NotFound(_))
            ));
        }
    }
}
