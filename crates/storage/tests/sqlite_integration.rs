use chrono::{DateTime, Duration, Utc};
use lesson_core::model::{
    Challenge, ChallengeDetail, ChallengeId, ChallengeKind, ChallengeOption, LessonId,
    LessonPerformanceSummary, OptionId, UserId,
};
use lesson_core::time::fixed_now;
use storage::repository::{
    LessonAnalyticsRecord, LessonAnalyticsRepository, LessonRecord, LessonRepository,
    ProgressRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn greetings() -> LessonRecord {
    let choice = Challenge::new(
        ChallengeId::new(11),
        ChallengeKind::VideoSelect,
        2,
        "What is being signed?",
        Some("https://player.example/goodbye".into()),
        vec![
            ChallengeOption::new(OptionId::new(111), "goodbye", true),
            ChallengeOption::new(OptionId::new(112), "hello", false)
                .with_media("/signs/hello.gif"),
        ],
    )
    .unwrap();
    let learn = Challenge::new(
        ChallengeId::new(10),
        ChallengeKind::VideoLearn,
        1,
        "goodbye",
        Some("https://player.example/goodbye".into()),
        Vec::new(),
    )
    .unwrap();
    let sign = Challenge::new(
        ChallengeId::new(12),
        ChallengeKind::SignDetect,
        3,
        "Perform the sign: \"goodbye\"",
        None,
        Vec::new(),
    )
    .unwrap();
    LessonRecord {
        id: LessonId::new(1),
        title: "Greetings".into(),
        challenges: vec![choice, sign, learn],
    }
}

#[tokio::test]
async fn sqlite_roundtrip_keeps_order_options_and_progress() {
    let repo = connect("memdb_lesson_roundtrip").await;
    repo.insert_lesson(&greetings()).await.unwrap();

    let user = UserId::new("learner");
    repo.upsert_challenge_progress(&user, ChallengeId::new(10), fixed_now())
        .await
        .unwrap();
    repo.upsert_challenge_progress(&user, ChallengeId::new(10), fixed_now())
        .await
        .unwrap();

    let loaded = repo.load_lesson(&user, LessonId::new(1)).await.unwrap();
    assert_eq!(loaded.title, "Greetings");
    let ids: Vec<u64> = loaded.challenges.iter().map(|c| c.id().value()).collect();
    assert_eq!(ids, vec![10, 11, 12]);
    assert!(loaded.challenges[0].completed());
    assert!(!loaded.challenges[1].completed());
    assert!((loaded.percentage - 100.0 / 3.0).abs() < 1e-9);

    let select = &loaded.challenges[1];
    assert_eq!(select.options().len(), 2);
    assert_eq!(select.correct_option().unwrap().id, OptionId::new(111));
    assert_eq!(select.options()[1].media_url.as_deref(), Some("/signs/hello.gif"));
    assert_eq!(loaded.challenges[2].target_sign(), "goodbye");
}

#[tokio::test]
async fn reinserting_a_lesson_keeps_progress() {
    let repo = connect("memdb_lesson_reinsert").await;
    let mut lesson = greetings();
    repo.insert_lesson(&lesson).await.unwrap();

    let user = UserId::new("learner");
    repo.upsert_challenge_progress(&user, ChallengeId::new(11), fixed_now())
        .await
        .unwrap();

    lesson.title = "Greetings II".into();
    repo.insert_lesson(&lesson).await.unwrap();

    let loaded = repo.load_lesson(&user, LessonId::new(1)).await.unwrap();
    assert_eq!(loaded.title, "Greetings II");
    assert!(loaded.challenges[1].completed());
    assert_eq!(loaded.challenges[1].options().len(), 2);
}

#[tokio::test]
async fn progress_is_stamped_with_the_given_time() {
    let repo = connect("memdb_progress_stamp").await;
    repo.insert_lesson(&greetings()).await.unwrap();
    let user = UserId::new("learner");

    repo.upsert_challenge_progress(&user, ChallengeId::new(10), fixed_now())
        .await
        .unwrap();
    let later = fixed_now() + Duration::minutes(5);
    repo.upsert_challenge_progress(&user, ChallengeId::new(10), later)
        .await
        .unwrap();

    let stamps: Vec<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT updated_at FROM challenge_progress WHERE user_id = ?1 AND challenge_id = 10",
    )
    .bind(user.as_str())
    .fetch_all(repo.pool())
    .await
    .unwrap();
    assert_eq!(stamps, vec![later]);
}

#[tokio::test]
async fn progress_for_unknown_challenge_is_rejected() {
    let repo = connect("memdb_progress_fk").await;
    let err = repo
        .upsert_challenge_progress(&UserId::new("u"), ChallengeId::new(999), fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn missing_lesson_is_not_found() {
    let repo = connect("memdb_missing_lesson").await;
    let err = repo
        .load_lesson(&UserId::new("u"), LessonId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn analytics_insert_and_list() {
    let repo = connect("memdb_analytics").await;
    let summary = LessonPerformanceSummary {
        total_challenges: 3,
        correct_first_try: 2,
        total_retries: 4,
        total_time_seconds: 95,
        points_earned: 30,
        challenge_details: vec![
            ChallengeDetail {
                kind: ChallengeKind::VideoLearn,
                retries: 0,
                time_spent: 5,
            },
            ChallengeDetail {
                kind: ChallengeKind::SignDetect,
                retries: 4,
                time_spent: 60,
            },
        ],
    };
    let user = UserId::new("learner");

    let first = LessonAnalyticsRecord::from_summary(
        user.clone(),
        LessonId::new(1),
        &summary,
        "older feedback",
        fixed_now(),
    )
    .unwrap();
    let second = LessonAnalyticsRecord::from_summary(
        user.clone(),
        LessonId::new(2),
        &summary,
        "newer feedback",
        fixed_now() + Duration::hours(1),
    )
    .unwrap();

    let id1 = repo.insert_analytics(&first).await.unwrap();
    let id2 = repo.insert_analytics(&second).await.unwrap();
    assert!(id2 > id1);

    let listed = repo.list_analytics(&user, 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0], second);
    assert_eq!(listed[1].details().unwrap(), summary.challenge_details);

    let limited = repo.list_analytics(&user, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}
