use std::path::Path;

use git2::{build::CheckoutBuilder, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

use gitcherry::GitCli;

/// Throwaway non-bare repository on `main` with a local identity.
pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

#[allow(dead_code)]
impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        {
            let mut cfg = repo.config().unwrap();
            cfg.set_str("user.name", "Test User").unwrap();
            cfg.set_str("user.email", "test@example.com").unwrap();
            cfg.set_bool("commit.gpgsign", false).unwrap();
        }
        Self { dir, repo }
    }

    /// Repository with a single `README` commit on `main`.
    pub fn with_initial_commit() -> Self {
        let t = Self::new();
        t.commit_file("README", "readme\n", "initial");
        t
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self) -> GitCli {
        GitCli::in_dir(self.path())
    }

    pub fn write_file(&self, name: &str, content: &str) {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// Write `name`, stage it, and commit on the checked-out branch.
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> String {
        self.commit_bytes(name, content.as_bytes(), message)
    }

    /// Like [`commit_file`](Self::commit_file) for content that need not be
    /// UTF-8.
    pub fn commit_bytes(&self, name: &str, content: &[u8], message: &str) -> String {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    /// Create `name` at the current HEAD without switching to it.
    pub fn branch(&self, name: &str) {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        self.repo.branch(name, &head, false).unwrap();
    }

    /// Lightweight tag `name` at the current HEAD.
    pub fn tag(&self, name: &str) {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        self.repo
            .tag_lightweight(name, head.as_object(), false)
            .unwrap();
    }

    pub fn checkout(&self, name: &str) {
        self.repo.set_head(&format!("refs/heads/{}", name)).unwrap();
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))
            .unwrap();
    }

    pub fn head_of(&self, branch: &str) -> String {
        self.repo
            .revparse_single(&format!("refs/heads/{}", branch))
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
            .to_string()
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo
            .find_branch(name, git2::BranchType::Local)
            .is_ok()
    }

    pub fn read_file(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.path().join(name)).ok()
    }

    /// Subject line of the tip commit of `branch`.
    pub fn tip_subject(&self, branch: &str) -> String {
        let commit = self
            .repo
            .revparse_single(&format!("refs/heads/{}", branch))
            .unwrap()
            .peel_to_commit()
            .unwrap();
        commit
            .message()
            .and_then(|m| m.lines().next())
            .unwrap_or_default()
            .to_string()
    }
}
