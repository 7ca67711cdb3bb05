//! Job dispatch.
//!
//! Turns the current template plus a miner's claimed chain position into a
//! session-specific job: replay addenda up to the template's parent, stamp
//! the template with the session id when the template version changed, and
//! refuse the job unless it builds directly on the block the session was
//! synced to.

use std::sync::Arc;
use thiserror::Error;

use crate::block::{ReservationError, SessionStamp};
use crate::chain::Blockchain;
use crate::protocol::{Addendum, HeightInfo, JobDetails, Status};
use crate::scratchpad::{ScratchpadError, ScratchpadStore};
use crate::session::{Session, SessionJob};
use crate::template::TemplateManager;
use crate::tracing::prelude::*;

/// Addendum construction attempts before a request fails.
pub const MAX_RESYNC_ATTEMPTS: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("session not authenticated")]
    NotInitialized,

    #[error("no template published yet")]
    NoTemplate,

    #[error("could not build addenda after {0} attempts")]
    ResyncFailed(usize),

    #[error("gap too large for addenda: {0}")]
    FullScratchpadRequired(ScratchpadError),

    #[error("job for height {template} does not follow assigned height {assigned}")]
    HeightMismatch { assigned: u64, template: u64 },

    #[error(transparent)]
    Reservation(#[from] ReservationError),
}

impl JobError {
    pub fn status(&self) -> Status {
        match self {
            JobError::NotInitialized => Status::NotInitialized,
            JobError::NoTemplate => Status::NoJob,
            JobError::ResyncFailed(_) => Status::ResyncFailed,
            JobError::FullScratchpadRequired(_) => Status::FullScratchpadRequired,
            JobError::HeightMismatch { .. } => Status::HeightMismatch,
            JobError::Reservation(_) => Status::InternalError,
        }
    }
}

/// A dispatched job together with the addenda the miner must apply first.
#[derive(Debug, Clone)]
pub struct JobAssignment {
    pub job: JobDetails,
    pub addms: Vec<Addendum>,
}

pub struct JobDispatcher {
    chain: Arc<dyn Blockchain>,
    templates: Arc<TemplateManager>,
    scratchpad: Arc<ScratchpadStore>,
    share_difficulty_ratio: u64,
}

impl JobDispatcher {
    pub fn new(
        chain: Arc<dyn Blockchain>,
        templates: Arc<TemplateManager>,
        scratchpad: Arc<ScratchpadStore>,
        share_difficulty_ratio: u64,
    ) -> Self {
        Self {
            chain,
            templates,
            scratchpad,
            share_difficulty_ratio,
        }
    }

    pub fn assign_job(
        &self,
        session: &mut Session,
        claimed: &HeightInfo,
    ) -> Result<JobAssignment, JobError> {
        let id = session.id().ok_or(JobError::NotInitialized)?;
        let template = self.templates.current().ok_or(JobError::NoTemplate)?;
        let parent_height = template.height - 1;

        let addms = self.addenda(claimed, parent_height)?;
        let last_assigned = match addms.last() {
            Some(last) if last.hi.height == parent_height => last.hi,
            _ => *claimed,
        };

        let auth = session
            .authenticated_mut()
            .ok_or(JobError::NotInitialized)?;
        auth.last_assigned = last_assigned;

        let stale = auth
            .job
            .as_ref()
            .is_none_or(|job| job.template_version != template.version);
        if stale {
            let mut block = template.block.clone();
            SessionStamp::new(id)
                .apply(&mut block.miner_tx.extra)
                .inspect_err(|e| {
                    error!(session = %id, version = template.version, error = %e, "Template cannot be stamped");
                })?;
            auth.job = Some(SessionJob {
                template_version: template.version,
                block,
                height: template.height,
                block_difficulty: template.difficulty,
                share_difficulty: template.difficulty.share_difficulty(self.share_difficulty_ratio),
            });
            trace!(session = %id, version = template.version, "Session job derived");
        }

        let Some(job) = auth.job.as_ref() else {
            return Err(JobError::NoTemplate);
        };
        if last_assigned.height + 1 != job.height {
            debug!(
                session = %id,
                assigned = last_assigned.height,
                template = job.height,
                "Miner not synced to template parent"
            );
            return Err(if claimed.height == 0 && job.height > 1 {
                JobError::FullScratchpadRequired(ScratchpadError::GapTooLarge {
                    from: 0,
                    to: parent_height,
                    limit: 0,
                })
            } else {
                JobError::HeightMismatch {
                    assigned: last_assigned.height,
                    template: job.height,
                }
            });
        }

        Ok(JobAssignment {
            job: JobDetails {
                blob: hex::encode(job.block.hashing_blob()),
                difficulty: job.share_difficulty,
                job_id: job.template_version.to_string(),
                prev_hi: HeightInfo::new(job.height - 1, job.block.header.prev_id),
            },
            addms,
        })
    }

    /// Addenda from `claimed` to `to_height`, retried a bounded number of
    /// times while the chain moves underneath.
    fn addenda(&self, claimed: &HeightInfo, to_height: u64) -> Result<Vec<Addendum>, JobError> {
        for attempt in 1..=MAX_RESYNC_ATTEMPTS {
            match self.scratchpad.diff(self.chain.as_ref(), claimed, to_height) {
                Ok(addms) if addms.last().is_none_or(|a| a.hi.height == to_height) => {
                    return Ok(addms);
                }
                Ok(addms) => {
                    debug!(attempt, got = addms.len(), to_height, "Addenda stop short of target");
                }
                Err(e @ ScratchpadError::GapTooLarge { .. }) => {
                    return Err(JobError::FullScratchpadRequired(e));
                }
                Err(e) => debug!(attempt, error = %e, "Addendum construction failed"),
            }
        }
        warn!(claimed = claimed.height, to_height, "Giving up on addenda");
        Err(JobError::ResyncFailed(MAX_RESYNC_ATTEMPTS))
    }
}
