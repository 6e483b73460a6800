//! Integration tests for dependency-aware expansion over a file-backed
//! SQLite database.
//!
//! Tests verify that:
//! - Expansion nests referencing rows downward and referenced rows upward
//! - A two-table cycle terminates with one level of nesting
//! - Null link values and filtered-out tables are skipped
//! - Plain selects perform no expansion

use autodb::{Condition, Connection, TableFilter};
use serde_json::json;
use tempfile::NamedTempFile;

async fn setup(statements: &[&str]) -> String {
    let db_path = NamedTempFile::new()
        .unwrap()
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let url = format!("sqlite:{db_path}");

    let bootstrap = Connection::connect(&url, None).await.unwrap();
    for sql in statements {
        bootstrap.execute(sql).await.unwrap();
    }
    bootstrap.close().await;
    url
}

/// authors 1-N posts 1-N comments, plus posts -> authors upward.
async fn blog_url() -> String {
    setup(&[
        "CREATE TABLE authors (uid INTEGER PRIMARY KEY, name TEXT)",
        "CREATE TABLE posts (pid INTEGER PRIMARY KEY, uid INTEGER REFERENCES authors(uid), title TEXT)",
        "CREATE TABLE comments (cid INTEGER PRIMARY KEY, pid INTEGER REFERENCES posts(pid), body TEXT)",
        "INSERT INTO authors (uid, name) VALUES (1, 'Ada')",
        "INSERT INTO posts (pid, uid, title) VALUES (10, 1, 'Engines')",
        "INSERT INTO posts (pid, uid, title) VALUES (11, NULL, 'Anonymous')",
        "INSERT INTO comments (cid, pid, body) VALUES (100, 10, 'First')",
        "INSERT INTO comments (cid, pid, body) VALUES (101, 10, 'Second')",
    ])
    .await
}

#[tokio::test]
async fn test_expansion_nests_both_directions() {
    let url = blog_url().await;
    let conn = Connection::connect(&url, None).await.unwrap();
    let posts = conn.table("posts").await.unwrap();

    let rows = posts
        .select_expanded(Some(&Condition::key(10)))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let post = &rows[0];

    // Downward: comments referencing posts.pid
    let comments = post["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["body"], json!("First"));

    // Upward: the author row this post references
    let authors = post["authors"].as_array().unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0]["name"], json!("Ada"));

    // The nested author does not recurse back into posts (the originator)
    assert!(!authors[0].as_object().unwrap().contains_key("posts"));
}

#[tokio::test]
async fn test_plain_select_does_not_expand() {
    let url = blog_url().await;
    let conn = Connection::connect(&url, None).await.unwrap();
    let posts = conn.table("posts").await.unwrap();

    let rows = posts.select(Some(&Condition::key(10))).await.unwrap();
    assert!(!rows[0].contains_key("comments"));
    assert!(!rows[0].contains_key("authors"));
}

#[tokio::test]
async fn test_null_link_values_skip_expansion() {
    let url = blog_url().await;
    let conn = Connection::connect(&url, None).await.unwrap();
    let posts = conn.table("posts").await.unwrap();

    let rows = posts
        .select_expanded(Some(&Condition::key(11)))
        .await
        .unwrap();
    let post = &rows[0];

    // pid is non-null, so the comments relation still attaches (empty)
    assert_eq!(post["comments"].as_array().unwrap().len(), 0);
    // uid is null, so no author lookup happens at all
    assert!(!post.contains_key("authors"));
}

#[tokio::test]
async fn test_two_table_cycle_terminates() {
    let url = setup(&[
        "CREATE TABLE a (id INTEGER PRIMARY KEY, b_id INTEGER REFERENCES b(id))",
        "CREATE TABLE b (id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a(id))",
        "INSERT INTO a (id, b_id) VALUES (1, NULL)",
        "INSERT INTO b (id, a_id) VALUES (20, 1)",
        "UPDATE a SET b_id = 20 WHERE id = 1",
    ])
    .await;
    let conn = Connection::connect(&url, None).await.unwrap();
    let a = conn.table("a").await.unwrap();

    let rows = a.select_expanded(Some(&Condition::key(1))).await.unwrap();
    assert_eq!(rows.len(), 1);

    // One level of b nested under a, and nothing of a nested under b
    let nested_b = rows[0]["b"].as_array().unwrap();
    assert_eq!(nested_b.len(), 1);
    assert_eq!(nested_b[0]["id"], json!(20));
    assert!(!nested_b[0].as_object().unwrap().contains_key("a"));
}

#[tokio::test]
async fn test_expansion_skips_filtered_out_tables() {
    let url = blog_url().await;
    let conn = Connection::connect(
        &url,
        Some(TableFilter::Exact(vec![
            "posts".to_string(),
            "comments".to_string(),
        ])),
    )
    .await
    .unwrap();
    let posts = conn.table("posts").await.unwrap();

    let rows = posts
        .select_expanded(Some(&Condition::key(10)))
        .await
        .unwrap();
    let post = &rows[0];

    assert_eq!(post["comments"].as_array().unwrap().len(), 2);
    // authors is outside the filter, so the upward relation is skipped
    assert!(!post.contains_key("authors"));
}
