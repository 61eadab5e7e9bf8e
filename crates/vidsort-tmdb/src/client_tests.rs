// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(test)]
mod tests {
    use crate::{SearchQuery, TmdbClient};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn movie_search_response() -> serde_json::Value {
        serde_json::json!({
            "page": 1,
            "total_pages": 1,
            "total_results": 2,
            "results": [
                {
                    "id": 603,
                    "title": "Matrix",
                    "original_title": "The Matrix",
                    "release_date": "1999-03-31",
                    "overview": "Un hacker descubre la verdad.",
                    "vote_average": 8.2,
                    "popularity": 93.5
                },
                {
                    "id": 604,
                    "title": "Matrix Reloaded",
                    "original_title": "The Matrix Reloaded",
                    "release_date": "2003-05-15",
                    "overview": "",
                    "vote_average": 7.0,
                    "popularity": 45.1
                }
            ]
        })
    }

    fn tv_search_response() -> serde_json::Value {
        serde_json::json!({
            "page": 1,
            "total_pages": 1,
            "total_results": 1,
            "results": [
                {
                    "id": 1396,
                    "name": "Breaking Bad",
                    "original_name": "Breaking Bad",
                    "first_air_date": "2008-01-20",
                    "overview": "Un profesor de química.",
                    "vote_average": 8.9,
                    "popularity": 250.0
                }
            ]
        })
    }

    fn test_client(server: &MockServer) -> TmdbClient {
        TmdbClient::builder("test-key")
            .base_url(server.uri())
            .rate_limit_interval(std::time::Duration::from_millis(0))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_movies() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("query", "Matrix"))
            .respond_with(ResponseTemplate::new(200).set_body_json(movie_search_response()))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let response = client
            .search_movies(SearchQuery::new("Matrix"))
            .await
            .unwrap();

        assert_eq!(response.total_results, 2);
        assert_eq!(response.results.len(), 2);

        let first = &response.results[0];
        assert_eq!(first.id, 603);
        assert_eq!(first.title, "Matrix");
        assert_eq!(first.original_title.as_deref(), Some("The Matrix"));
        assert_eq!(first.year(), Some(1999));
    }

    #[tokio::test]
    async fn test_search_movies_with_year() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("query", "Matrix"))
            .and(query_param("year", "1999"))
            .respond_with(ResponseTemplate::new(200).set_body_json(movie_search_response()))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let _response = client
            .search_movies(SearchQuery::new("Matrix").year(1999))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_search_tv() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/tv"))
            .and(query_param("query", "Breaking Bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tv_search_response()))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let response = client
            .search_tv(SearchQuery::new("Breaking Bad"))
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        let series = &response.results[0];
        assert_eq!(series.id, 1396);
        assert_eq!(series.year(), Some(2008));
    }

    #[tokio::test]
    async fn test_unauthorized_is_a_distinct_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let err = client
            .search_movies(SearchQuery::new("Matrix"))
            .await
            .unwrap_err();

        assert!(matches!(err, crate::TmdbError::Unauthorized));
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let err = client
            .search_movies(SearchQuery::new("Matrix"))
            .await
            .unwrap_err();

        assert!(matches!(err, crate::TmdbError::RateLimitExceeded));
    }

    #[tokio::test]
    async fn test_empty_results_deserialize() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page": 1,
                "total_pages": 0,
                "total_results": 0,
                "results": []
            })))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let response = client
            .search_movies(SearchQuery::new("zzzzz"))
            .await
            .unwrap();

        assert!(response.results.is_empty());
    }
}
