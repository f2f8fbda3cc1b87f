//! The local storage delegate contract.
//!
//! `spec.md` treats the versioned storage engine as an external collaborator
//! ("the underlying versioned storage engine... out of scope; only their
//! contracts are specified"). This trait is that contract: the command
//! executor (C3) calls it to run a command against local state, and the
//! watch subsystem (C5) calls it to find matching revisions and read content.
//! Its contract is total per `spec.md` §4.3 step 6: it either returns a
//! typed result or a recoverable [`DogmaError`] domain error — it never
//! panics on valid input.

use std::sync::Arc;

use dogma_types::{Command, CommandResult, Content, DogmaResult, RepositoryId, Revision};

/// The out-of-scope local storage delegate that the command executor (C3)
/// and watch subsystem (C5) run against.
pub trait LocalStorage: Send + Sync + 'static {
    /// Executes `cmd` against local state, returning its typed result.
    ///
    /// For [`Command::NormalizingPush`], the base revision is resolved
    /// against head *here* (the storage owns the revision history) and the
    /// returned [`CommandResult::CommitResult`] carries the concrete
    /// revision the executor must use when rewriting the command for
    /// logging (`spec.md` §4.3 step 7).
    fn execute(&self, cmd: &Command) -> impl Future<Output = DogmaResult<CommandResult>> + Send;

    /// Reads a single file's content at `revision` (relative revisions are
    /// resolved against this repository's head).
    fn get_file(
        &self,
        repo: &RepositoryId,
        revision: Revision,
        path: &str,
    ) -> impl Future<Output = DogmaResult<Content>> + Send;

    /// The current absolute head revision of `repo`.
    fn head_revision(&self, repo: &RepositoryId) -> impl Future<Output = DogmaResult<Revision>> + Send;

    /// The greatest revision in `(last_known, head]` whose commit touched a
    /// path matching `pattern`, or `None` if no such revision exists
    /// (`spec.md` §4.5, the server-side watch primitive).
    fn find_latest_revision(
        &self,
        repo: &RepositoryId,
        last_known: Revision,
        pattern: &str,
    ) -> impl Future<Output = DogmaResult<Option<Revision>>> + Send;
}

/// Lets one storage instance be shared by several components (an executor
/// and a watch server, say) without cloning state out of it.
impl<S: LocalStorage> LocalStorage for Arc<S> {
    fn execute(&self, cmd: &Command) -> impl Future<Output = DogmaResult<CommandResult>> + Send {
        (**self).execute(cmd)
    }

    fn get_file(
        &self,
        repo: &RepositoryId,
        revision: Revision,
        path: &str,
    ) -> impl Future<Output = DogmaResult<Content>> + Send {
        (**self).get_file(repo, revision, path)
    }

    fn head_revision(&self, repo: &RepositoryId) -> impl Future<Output = DogmaResult<Revision>> + Send {
        (**self).head_revision(repo)
    }

    fn find_latest_revision(
        &self,
        repo: &RepositoryId,
        last_known: Revision,
        pattern: &str,
    ) -> impl Future<Output = DogmaResult<Option<Revision>>> + Send {
        (**self).find_latest_revision(repo, last_known, pattern)
    }
}
