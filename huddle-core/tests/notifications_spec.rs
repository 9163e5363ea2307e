use huddle_core::models::{Project, User};
use speculate2::speculate;

struct Team {
    project: Project,
    admin: User,
    member: User,
}

speculate! {
    use chrono::{Duration, Local, Utc};
    use huddle_core::db::Database;
    use huddle_core::directory::Directory;
    use huddle_core::models::*;
    use huddle_core::services::notifications::{day_bucket, group_by_day};
    use huddle_core::services::{NotificationService, ProjectService, TaskService};
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
        let admin = register(db, "Ada", "ada@example.com");
        let member = register(db, "Mel", "mel@example.com");
        let projects = ProjectService::new(db.clone());
        let project = projects.create(admin.id, CreateProjectInput {
            name: "Apollo".into(), key: "APL".into(), description: None,
        }).expect("Failed to create project");
        projects.add_member(admin.id, project.id, member.id, Role::Member).unwrap();
        Team { project, admin, member }
    }

    /// Fan 45 task-assigned notifications out to the member.
    fn seed_assignments(db: &Database, team: &Team, count: usize) {
        let tasks = TaskService::new(db.clone());
        for i in 0..count {
            tasks.create(team.admin.id, team.project.id, CreateTaskInput {
                title: format!("Task {i}"),
                description: None,
                priority: None,
                assigned_to: Some(team.member.id),
                due_date: None,
            }).expect("Failed to create task");
        }
    }

    fn sample_notification(user: Uuid, created_at: chrono::DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: user,
            kind: NotificationKind::TaskAssigned,
            title: "t".into(),
            message: "m".into(),
            link: "/".into(),
            project_id: Uuid::new_v4(),
            task_id: None,
            tab: NotificationTab::Direct,
            read: false,
            created_at,
        }
    }

    describe "pagination contract" {
        it "pages 45 notifications as 20/20/5" {
            let db = setup_db();
            let team = setup_team(&db);
            seed_assignments(&db, &team, 45);
            let service = NotificationService::new(db.clone());

            let first = service.list(team.member.id, NotificationQuery {
                limit: 20, offset: 0, unread_only: false, tab: NotificationTab::Direct,
            }).unwrap();
            assert_eq!(first.total, 45);
            assert_eq!(first.items.len(), 20);
            assert!(first.has_more);
            assert_eq!(first.next_offset, Some(20));

            let last = service.list(team.member.id, NotificationQuery {
                limit: 20, offset: 40, unread_only: false, tab: NotificationTab::Direct,
            }).unwrap();
            assert_eq!(last.items.len(), 5);
            assert!(!last.has_more);
            assert_eq!(last.next_offset, None);
        }

        it "returns newest first" {
            let db = setup_db();
            let team = setup_team(&db);
            seed_assignments(&db, &team, 3);
            let service = NotificationService::new(db.clone());

            let page = service.list(team.member.id, NotificationQuery::default()).unwrap();
            assert_eq!(page.items[0].title, "You've been assigned: Task 2");
            assert!(page.items.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        }

        it "filters by unread only" {
            let db = setup_db();
            let team = setup_team(&db);
            seed_assignments(&db, &team, 3);
            let service = NotificationService::new(db.clone());

            let page = service.list(team.member.id, NotificationQuery::default()).unwrap();
            service.mark_read(team.member.id, page.items[0].id).unwrap();

            let unread = service.list(team.member.id, NotificationQuery {
                unread_only: true, ..NotificationQuery::default()
            }).unwrap();
            assert_eq!(unread.total, 2);
            assert!(unread.items.iter().all(|n| !n.read));
        }
    }

    describe "read state" {
        it "marks idempotently and scopes to the recipient" {
            let db = setup_db();
            let team = setup_team(&db);
            seed_assignments(&db, &team, 1);
            let service = NotificationService::new(db.clone());

            let page = service.list(team.member.id, NotificationQuery::default()).unwrap();
            let id = page.items[0].id;
            service.mark_read(team.member.id, id).unwrap();
            // Re-marking is a no-op, not an error.
            service.mark_read(team.member.id, id).unwrap();

            // Someone else's notification looks like it does not exist.
            let other = service.mark_read(team.admin.id, id);
            assert!(matches!(other, Err(DomainError::NotFound(_))));
        }

        it "marks everything read in one call, idempotently" {
            let db = setup_db();
            let team = setup_team(&db);
            seed_assignments(&db, &team, 5);
            let service = NotificationService::new(db.clone());

            assert_eq!(service.mark_all_read(team.member.id).unwrap(), 5);
            assert_eq!(service.mark_all_read(team.member.id).unwrap(), 0);
        }

        it "lets recipients delete their own notifications" {
            let db = setup_db();
            let team = setup_team(&db);
            seed_assignments(&db, &team, 2);
            let service = NotificationService::new(db.clone());

            let page = service.list(team.member.id, NotificationQuery::default()).unwrap();
            service.delete(team.member.id, page.items[0].id).unwrap();
            assert_eq!(service.list(team.member.id, NotificationQuery::default()).unwrap().total, 1);

            let gone = service.delete(team.member.id, page.items[0].id);
            assert!(matches!(gone, Err(DomainError::NotFound(_))));
        }
    }

    describe "comment events" {
        it "notifies the assignee but never the commenter" {
            let db = setup_db();
            let team = setup_team(&db);
            let tasks = TaskService::new(db.clone());
            let task = tasks.create(team.admin.id, team.project.id, CreateTaskInput {
                title: "Discuss".into(), description: None, priority: None,
                assigned_to: Some(team.member.id), due_date: None,
            }).unwrap();
            let service = NotificationService::new(db.clone());
            let baseline = service.list(team.member.id, NotificationQuery::default()).unwrap().total;

            // Admin comments: assignee notified.
            service.comment_added(team.admin.id, task.id).unwrap();
            let after = service.list(team.member.id, NotificationQuery::default()).unwrap();
            assert_eq!(after.total, baseline + 1);
            assert_eq!(after.items[0].kind, NotificationKind::CommentAdded);

            // Assignee comments on their own task: suppressed.
            service.comment_added(team.member.id, task.id).unwrap();
            let unchanged = service.list(team.member.id, NotificationQuery::default()).unwrap();
            assert_eq!(unchanged.total, baseline + 1);
        }

        it "requires the commenter to be a member" {
            let db = setup_db();
            let team = setup_team(&db);
            let outsider = register(&db, "Out", "out@example.com");
            let tasks = TaskService::new(db.clone());
            let task = tasks.create(team.admin.id, team.project.id, CreateTaskInput {
                title: "Discuss".into(), description: None, priority: None,
                assigned_to: Some(team.member.id), due_date: None,
            }).unwrap();

            let result = NotificationService::new(db.clone()).comment_added(outsider.id, task.id);
            assert!(matches!(result, Err(DomainError::Forbidden(_))));
        }
    }

    describe "day bucketing" {
        it "compares calendar dates, not 24-hour windows" {
            let today = Local::now().date_naive();
            let yesterday = today.pred_opt().unwrap();
            let last_week = today - Duration::days(7);

            assert_eq!(day_bucket(today, today), DayBucket::Today);
            assert_eq!(day_bucket(yesterday, today), DayBucket::Yesterday);
            assert_eq!(day_bucket(last_week, today), DayBucket::Older);
        }

        it "groups a newest-first list preserving order within buckets" {
            let user = Uuid::new_v4();
            let now = Local::now();
            let today = now.date_naive();

            let items = vec![
                sample_notification(user, now.with_timezone(&Utc)),
                sample_notification(user, (now - Duration::hours(1)).with_timezone(&Utc)),
                sample_notification(user, (now - Duration::days(1)).with_timezone(&Utc)),
                sample_notification(user, (now - Duration::days(10)).with_timezone(&Utc)),
                sample_notification(user, (now - Duration::days(11)).with_timezone(&Utc)),
            ];
            let first_id = items[0].id;

            let groups = group_by_day(items, today);
            let buckets: Vec<DayBucket> = groups.iter().map(|(b, _)| *b).collect();
            assert_eq!(buckets, vec![DayBucket::Today, DayBucket::Yesterday, DayBucket::Older]);
            assert_eq!(groups[0].1.len(), 2);
            assert_eq!(groups[0].1[0].id, first_id);
            assert_eq!(groups[2].1.len(), 2);
        }
    }
}
