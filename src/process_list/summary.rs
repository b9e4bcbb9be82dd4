use super::ProcessList;
use crate::core::Verdict;
use crate::platform::ProcessBackend;

impl<B: ProcessBackend> ProcessList<B> {
    /// Verdict over the active region once everything has finished.
    ///
    /// Indeterminate while any entry is unfinished, even if a finished one
    /// already failed. An empty region is a success.
    pub fn summary_result(&self) -> Verdict {
        let mut failed = false;
        for entry in self.entries() {
            if !entry.is_finished() {
                return Verdict::Indeterminate;
            }
            failed |= entry.has_failed();
        }

        if failed {
            Verdict::Failure
        } else {
            Verdict::Success
        }
    }

    /// Like [`summary_result`](Self::summary_result) but reports a failure as
    /// soon as any finished entry has one.
    pub fn summary_result_short(&self) -> Verdict {
        let mut pending = false;
        for entry in self.entries() {
            if entry.has_failed() {
                return Verdict::Failure;
            }
            pending |= !entry.is_finished();
        }

        if pending {
            Verdict::Indeterminate
        } else {
            Verdict::Success
        }
    }
}
