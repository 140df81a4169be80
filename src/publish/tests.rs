//! Publisher tests against a mocked target API and local bare remotes.

use std::io::Write;

use camino::Utf8PathBuf;
use git2::Repository;
use http::{Method, StatusCode};
use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::{GitPublisher, PreviewSite, PublishOutcome, PublishRequest, Publisher};
use crate::error::PreviewError;
use crate::github::{
    ApiError, ApiResponse, BearerToken, CommitSha, MockTransport, PullRequestNumber,
    RepositoryName, RepositoryOwner, TargetClient,
};
use crate::vcs::CommitIdentity;

const PREVIEW_REPO: &str = "/repos/www-jovian/Jovian-NixOS-PR42";

struct Sandbox {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Sandbox {
    fn remotes(&self) -> Utf8PathBuf {
        self.root.join("remotes")
    }

    fn preview_repo(&self) -> Utf8PathBuf {
        let owner = self.remotes().join("www-jovian");
        std::fs::create_dir_all(&owner).expect("owner dir");
        owner.join("Jovian-NixOS-PR42")
    }

    fn scratch(&self) -> Utf8PathBuf {
        let scratch = self.root.join("scratch");
        std::fs::create_dir_all(&scratch).expect("scratch dir");
        scratch
    }

    fn site(&self) -> PreviewSite {
        std::fs::create_dir_all(self.remotes()).expect("remotes dir");
        let web_base = Url::from_directory_path(self.remotes()).expect("absolute remotes path");
        PreviewSite::new(
            RepositoryOwner::new("Jovian-Experiments"),
            RepositoryName::new("Jovian-NixOS"),
            RepositoryOwner::new("www-jovian"),
            web_base,
        )
    }

    fn archive(&self, name: &str, entries: &[(&str, &str)]) -> Utf8PathBuf {
        let path = self.root.join(name);
        let mut writer = ZipWriter::new(std::fs::File::create(&path).expect("archive file"));
        for (entry, contents) in entries {
            writer
                .start_file(*entry, SimpleFileOptions::default())
                .expect("zip entry");
            writer.write_all(contents.as_bytes()).expect("zip contents");
        }
        writer.finish().expect("zip finish");
        path
    }

    fn request(&self, sha: &str, archive: Utf8PathBuf) -> PublishRequest {
        PublishRequest {
            number: PullRequestNumber::new(42),
            head_sha: CommitSha::new(sha),
            archive,
        }
    }

    fn resolve(&self, reference: &str) -> String {
        let repo = Repository::open_bare(self.preview_repo()).expect("bare preview repo");
        repo.find_reference(reference)
            .and_then(|found| found.peel_to_commit())
            .map(|commit| commit.id().to_string())
            .expect("reference should resolve")
    }
}

#[fixture]
fn sandbox() -> Sandbox {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf-8 temp dir");
    Sandbox { _dir: dir, root }
}

fn identity() -> CommitIdentity {
    CommitIdentity {
        name: "Jovian Experiments".to_owned(),
        email: "jovian-experiments@users.noreply.github.com".to_owned(),
    }
}

fn publisher<'a>(transport: &'a MockTransport, sandbox: &Sandbox) -> GitPublisher<'a, MockTransport> {
    let target = TargetClient::new(
        transport,
        RepositoryOwner::new("www-jovian"),
        BearerToken::new("target-token"),
    );
    GitPublisher::new(target, sandbox.site(), "gh-pages", identity(), sandbox.scratch())
}

fn expect_lookup(transport: &mut MockTransport, status: StatusCode, times: usize) {
    transport
        .expect_request()
        .withf(|request| request.method == Method::GET && request.path == PREVIEW_REPO)
        .times(times)
        .returning(move |_| Ok(ApiResponse::new(status, json!({"message": "m"}))));
}

fn expect_create_initialising(transport: &mut MockTransport, bare: Utf8PathBuf) {
    transport
        .expect_request()
        .withf(|request| request.method == Method::POST && request.path == "/orgs/www-jovian/repos")
        .times(1)
        .returning(move |_| {
            Repository::init_bare(&bare).expect("init preview repo");
            Ok(ApiResponse::new(
                StatusCode::CREATED,
                json!({"name": "Jovian-NixOS-PR42"}),
            ))
        });
}

#[rstest]
#[tokio::test]
async fn first_publish_creates_repository_commits_and_tags(sandbox: Sandbox) {
    let mut transport = MockTransport::new();
    expect_lookup(&mut transport, StatusCode::NOT_FOUND, 1);
    expect_create_initialising(&mut transport, sandbox.preview_repo());
    let archive = sandbox.archive("abc123.zip", &[("index.html", "<h1>docs</h1>")]);

    let outcome = publisher(&transport, &sandbox)
        .publish(&sandbox.request("abc123", archive))
        .await
        .expect("publish should succeed");

    assert_eq!(
        outcome,
        PublishOutcome {
            was_updated: true,
            created_repository: true,
        }
    );
    assert_eq!(
        sandbox.resolve("refs/tags/sha_abc123"),
        sandbox.resolve("refs/heads/gh-pages")
    );
    let repo = Repository::open_bare(sandbox.preview_repo()).expect("bare repo");
    let head = repo
        .find_reference("refs/heads/gh-pages")
        .and_then(|found| found.peel_to_commit())
        .expect("gh-pages commit");
    assert!(
        head.message()
            .is_some_and(|message| message.starts_with("Preview for PR#42\n\nSee ")),
        "unexpected message {:?}",
        head.message()
    );
    assert_eq!(head.author().name(), Some("Jovian Experiments"));
    assert!(
        !sandbox.root.join("scratch/Jovian-NixOS-PR42").exists(),
        "clone directory is removed"
    );
}

#[rstest]
#[tokio::test]
async fn identical_republish_is_not_an_update(sandbox: Sandbox) {
    let mut transport = MockTransport::new();
    expect_lookup(&mut transport, StatusCode::OK, 2);
    Repository::init_bare(sandbox.preview_repo()).expect("init preview repo");
    let archive = sandbox.archive("docs.zip", &[("index.html", "same")]);
    let publisher = publisher(&transport, &sandbox);

    let first = publisher
        .publish(&sandbox.request("abc123", archive.clone()))
        .await
        .expect("first publish");
    let second = publisher
        .publish(&sandbox.request("def456", archive))
        .await
        .expect("second publish");

    assert!(first.was_updated);
    assert!(!first.created_repository);
    assert!(!second.was_updated, "identical content yields no commit");
    assert_eq!(
        sandbox.resolve("refs/tags/sha_def456"),
        sandbox.resolve("refs/tags/sha_abc123"),
        "new tag points at the unchanged tip"
    );
}

#[rstest]
#[tokio::test]
async fn dropped_pages_disappear_from_the_preview(sandbox: Sandbox) {
    let mut transport = MockTransport::new();
    expect_lookup(&mut transport, StatusCode::OK, 2);
    Repository::init_bare(sandbox.preview_repo()).expect("init preview repo");
    let before = sandbox.archive("v1.zip", &[("index.html", "v1"), ("old.html", "gone soon")]);
    let after = sandbox.archive("v2.zip", &[("index.html", "v2")]);
    let publisher = publisher(&transport, &sandbox);

    publisher
        .publish(&sandbox.request("one", before))
        .await
        .expect("first publish");
    let outcome = publisher
        .publish(&sandbox.request("two", after))
        .await
        .expect("second publish");

    assert!(outcome.was_updated);
    let repo = Repository::open_bare(sandbox.preview_repo()).expect("bare repo");
    let tree = repo
        .find_reference("refs/heads/gh-pages")
        .and_then(|found| found.peel_to_tree())
        .expect("gh-pages tree");
    assert!(tree.get_name("old.html").is_none());
    assert!(tree.get_name("index.html").is_some());
}

#[rstest]
#[case::lookup_failure(StatusCode::INTERNAL_SERVER_ERROR)]
#[case::lookup_forbidden(StatusCode::FORBIDDEN)]
#[tokio::test]
async fn lookup_errors_abort_before_cloning(sandbox: Sandbox, #[case] status: StatusCode) {
    let mut transport = MockTransport::new();
    expect_lookup(&mut transport, status, 1);
    let archive = sandbox.archive("docs.zip", &[("index.html", "x")]);

    let result = publisher(&transport, &sandbox)
        .publish(&sandbox.request("abc123", archive))
        .await;

    assert!(
        matches!(
            result,
            Err(PreviewError::Api(
                ApiError::UnexpectedStatus { .. } | ApiError::Authentication { .. }
            ))
        ),
        "unexpected result {result:?}"
    );
}

#[rstest]
#[tokio::test]
async fn rejected_creation_is_fatal(sandbox: Sandbox) {
    let mut transport = MockTransport::new();
    expect_lookup(&mut transport, StatusCode::NOT_FOUND, 1);
    transport
        .expect_request()
        .withf(|request| request.method == Method::POST)
        .times(1)
        .returning(|_| {
            Ok(ApiResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({"message": "name already exists on this account"}),
            ))
        });
    let archive = sandbox.archive("docs.zip", &[("index.html", "x")]);

    let result = publisher(&transport, &sandbox)
        .publish(&sandbox.request("abc123", archive))
        .await;

    assert!(
        matches!(
            result,
            Err(PreviewError::Api(ApiError::UnexpectedStatus { status, .. }))
                if status == StatusCode::UNPROCESSABLE_ENTITY
        ),
        "unexpected result {result:?}"
    );
}
