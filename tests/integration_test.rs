use empower_ai::clarification::{CandidateMatch, ClarificationOutcome};
use empower_ai::heuristic::HeuristicGenerator;
use empower_ai::highlight::Snippet;
use empower_ai::llm::{ScriptedGenerator, ScriptedReply};
use empower_ai::prompts::{CLARIFICATION, SCHEMA_MAPPING};
use empower_ai::results::{paginate, CacheStatus, QueryCategory};
use empower_ai::retry::RetryPolicy;
use empower_ai::{EmpowerError, QueryService};
use std::sync::Arc;
use std::time::Duration;

fn offline_service() -> QueryService {
    QueryService::with_generator(Arc::new(HeuristicGenerator::new()), Duration::from_secs(5))
}

fn john_smiths() -> Vec<CandidateMatch> {
    vec![
        CandidateMatch::new("1", "John Smith", "Engineering"),
        CandidateMatch::new("2", "John Smith", "Sales"),
    ]
}

#[test]
fn test_routing_scenarios() {
    let service = offline_service();
    let cases = [
        ("Show me performance reviews for engineers hired last year", QueryCategory::DocumentSearch),
        ("Show me all Python developers in Engineering", QueryCategory::Combined),
        ("How many employees do we have?", QueryCategory::Structured),
        ("Find resumes mentioning Python", QueryCategory::DocumentSearch),
    ];
    for (query, expected) in cases {
        let routed = service.route(query).unwrap();
        assert_eq!(routed.result.category(), expected, "{}", query);
    }
}

#[test]
fn test_payload_shape_per_category() {
    let service = offline_service();

    let structured = service.route("List the top earners").unwrap().result;
    assert!(structured.hits().is_empty());
    assert_eq!(structured.rows().len(), 5);

    let documents = service.route("performance review notes").unwrap().result;
    assert!(documents.rows().is_empty());
    assert_eq!(documents.hits().len(), 3);

    let combined = service.route("python skills").unwrap().result;
    assert_eq!(combined.rows().len(), 3);
    assert_eq!(combined.hits().len(), 2);
}

#[test]
fn test_repeated_query_hits_cache() {
    let service = offline_service();
    let first = service.route("How many employees do we have?").unwrap();
    let second = service.route("  how many employees   do we HAVE? ").unwrap();

    assert_eq!(first.metrics.cache, CacheStatus::Miss);
    assert_eq!(second.metrics.cache, CacheStatus::Hit);
    assert_eq!(first.result, second.result);
    assert!(second.metrics.summary().ends_with("(cache hit)"));

    let dashboard = service.dashboard();
    assert_eq!(dashboard.cache.hit_rate_percent, 50);
}

#[test]
fn test_empty_query_rejected() {
    let service = offline_service();
    assert!(matches!(service.route("   "), Err(EmpowerError::InvalidQuery(_))));
    assert_eq!(service.dashboard().cache.lookups, 0);
}

#[tokio::test]
async fn test_context_in_query_resolves_without_service_call() {
    let generator = Arc::new(ScriptedGenerator::new());
    let service = QueryService::with_generator(generator.clone(), Duration::from_secs(1));

    let outcome = service
        .clarify("What is John Smith's salary in Engineering?", &john_smiths())
        .await
        .unwrap();
    match outcome {
        ClarificationOutcome::ClarifiedQuery(q) => {
            assert!(q.contains("id: 1"));
            assert!(!q.contains("id: 2"));
        }
        other => panic!("expected clarified query, got {:?}", other),
    }
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_department_of_someone_else_is_not_a_match() {
    let candidates = vec![
        CandidateMatch::new("1", "John Smith", "Engineering"),
        CandidateMatch::new("2", "Jane Doe", "Sales"),
    ];
    let outcome = offline_service()
        .clarify("What is Jane Doe's salary in Engineering?", &candidates)
        .await
        .unwrap();
    assert_eq!(outcome, ClarificationOutcome::Candidates(candidates));
}

#[tokio::test]
async fn test_offline_clarification_asks_follow_up() {
    let outcome = offline_service()
        .clarify("What is John Smith's salary?", &john_smiths())
        .await
        .unwrap();
    assert!(matches!(outcome, ClarificationOutcome::FollowUpQuestions(ref q) if q.len() == 1));
}

#[tokio::test]
async fn test_ambiguous_response_is_rejected() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.reply(
        &CLARIFICATION,
        r#"{"clarifiedQuery": "John Smith (id: 1)", "followUpQuestions": ["Which one?"]}"#,
    );
    let service = QueryService::with_generator(generator, Duration::from_secs(1));
    let result = service.clarify("John Smith's salary", &john_smiths()).await;
    assert!(matches!(result, Err(EmpowerError::Decode(_))));
}

#[tokio::test]
async fn test_service_timeout_surfaces() {
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push(&SCHEMA_MAPPING, ScriptedReply::Hang);
    let service = QueryService::with_generator(generator, Duration::from_millis(20))
        .with_retry(RetryPolicy::none());

    let result = service.map_to_schema("annual salary of engineers", None).await;
    assert!(matches!(result, Err(EmpowerError::Timeout(_))));
}

#[tokio::test]
async fn test_offline_mapping_covers_every_term() {
    let query = "What is John Smith's salary in each department?";
    let mapping = offline_service().map_to_schema(query, None).await.unwrap();

    assert_eq!(
        mapping.get("John Smith"),
        Some(&Some("employees.full_name".to_string()))
    );
    assert_eq!(
        mapping.get("salary"),
        Some(&Some("employees.annual_salary".to_string()))
    );
    for (term, _) in mapping.iter() {
        assert!(query.contains(term.as_str()), "{}", term);
    }
}

#[tokio::test]
async fn test_offline_suggestions() {
    let suggestions = offline_service().suggest_queries(None).await.unwrap();
    assert_eq!(suggestions.len(), 5);
}

#[tokio::test]
async fn test_connect_and_schema_counts_agree() {
    let service = offline_service();
    let info = service
        .connect("postgresql://hr@db.example.com:5432/company")
        .await
        .unwrap();
    assert_eq!(info, service.schema().info);
}

#[test]
fn test_snippets_never_pass_markup_through() {
    let snippet = Snippet::from_marked("<img src=x onerror=alert(1)> knows <mark>Python</mark>");
    let html = snippet.to_html();
    assert!(html.starts_with("&lt;img"));
    assert!(html.ends_with("<mark>Python</mark>"));
    assert_eq!(snippet.highlighted(), vec!["Python"]);
}

#[test]
fn test_pagination_of_routed_rows() {
    let service = offline_service();
    let routed = service.route("headcount").unwrap();
    let page = paginate(routed.result.rows(), 7);
    assert_eq!(page.page, 1);
    assert_eq!(page.total_pages, 1);
    assert!(!page.needs_controls());
}
