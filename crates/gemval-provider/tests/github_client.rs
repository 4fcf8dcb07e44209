//! GitHub client against a mock HTTP server.

use gemval_provider::{GitHubClient, ProviderClient, ProviderError, ProviderSettings};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GitHubClient {
    let settings = ProviderSettings::github("gh-secret")
        .api_url(&server.uri())
        .raw_url(&server.uri());
    GitHubClient::new(settings).expect("client")
}

#[tokio::test]
async fn search_excludes_standard_repository() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Authorization", "token gh-secret"))
        .and(body_string_contains("fork:true topic:standard-gem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "search": { "repos": [
                { "repo": { "nameWithOwner": "MetabolicAtlas/standard-GEM" } },
                { "repo": { "nameWithOwner": "SysBioChalmers/Human-GEM" } },
                { "repo": { "nameWithOwner": "SysBioChalmers/Yeast-GEM" } }
            ] } }
        })))
        .mount(&server)
        .await;

    let repos = client_for(&server)
        .list_tagged_repositories("standard-gem")
        .await
        .expect("search");
    assert_eq!(repos, vec!["SysBioChalmers/Human-GEM", "SysBioChalmers/Yeast-GEM"]);
}

#[tokio::test]
async fn releases_sorted_with_branch_prepended() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repository": { "releases": { "edges": [
                { "node": { "tagName": "v1.0.0", "createdAt": "2023-06-01T00:00:00Z" } },
                { "node": { "tagName": "draft", "createdAt": null } },
                { "node": { "tagName": "v2.0.0", "createdAt": "2024-01-01T00:00:00Z" } }
            ] } } }
        })))
        .mount(&server)
        .await;

    let tags = client_for(&server)
        .list_releases("acme/model-x")
        .await
        .expect("releases");
    assert_eq!(tags, vec!["main", "v2.0.0", "v1.0.0", "draft"]);
}

#[tokio::test]
async fn graphql_errors_become_provider_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Could not resolve to a Repository" }]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_releases("acme/missing")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::GraphQl { .. }));
    assert!(err.to_string().contains("Could not resolve"));
}

#[tokio::test]
async fn raw_file_404_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/model-x/v1/.standard-GEM.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let file = client_for(&server)
        .fetch_raw_file("acme/model-x", "v1", ".standard-GEM.md")
        .await
        .expect("404 is not an error");
    assert!(file.is_none());
}

#[tokio::test]
async fn raw_file_server_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/model-x/v1/model/model-x.yml"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_raw_file("acme/model-x", "v1", "model/model-x.yml")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn raw_file_content_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/model-x/main/.standard-GEM.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# standard-GEM\n- [x] done\n"))
        .mount(&server)
        .await;

    let file = client_for(&server)
        .fetch_raw_file("acme/model-x", "main", ".standard-GEM.md")
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(file, b"# standard-GEM\n- [x] done\n");
}

fn metadata_body() -> serde_json::Value {
    json!({
        "data": { "repository": {
            "owner": { "login": "acme", "avatarUrl": "https://avatars.example.com/u/1?v=4" },
            "defaultBranchRef": { "target": {
                "committedDate": "2024-03-01T12:00:00Z",
                "history": { "totalCount": 412 }
            } }
        } }
    })
}

#[tokio::test]
async fn metadata_counts_contributors_from_link_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/model-x/contributors"))
        .and(query_param("per_page", "1"))
        .and(query_param("anon", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "link",
                    r#"<https://api.github.com/repositories/9/contributors?per_page=1&anon=true&page=2>; rel="next", <https://api.github.com/repositories/9/contributors?per_page=1&anon=true&page=23>; rel="last""#,
                )
                .set_body_json(json!([{ "login": "alice" }])),
        )
        .mount(&server)
        .await;

    let info = client_for(&server)
        .fetch_repository_metadata("acme/model-x")
        .await
        .expect("metadata");
    assert_eq!(info.owner.as_deref(), Some("acme"));
    assert_eq!(
        info.avatar_url.as_deref(),
        Some("https://avatars.example.com/u/1?v=4")
    );
    assert_eq!(info.commit_count, 412);
    assert_eq!(info.contributor_count, 23);
    assert_eq!(info.latest_commit_date.as_deref(), Some("2024-03-01T12:00:00Z"));
}

#[tokio::test]
async fn metadata_counts_contributors_without_link_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/model-x/contributors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "login": "alice" }])))
        .mount(&server)
        .await;

    let info = client_for(&server)
        .fetch_repository_metadata("acme/model-x")
        .await
        .expect("metadata");
    assert_eq!(info.contributor_count, 1);
}

#[tokio::test]
async fn metadata_http_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fetch_repository_metadata("acme/model-x")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(502));
}
