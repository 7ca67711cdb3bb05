//! The pool service.
//!
//! [`Pool`] owns every shared component and exposes the four miner
//! operations. Each operation resolves its own failures into a status
//! string; nothing escapes a session except an authentication failure,
//! which the transport answers by closing the connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;

use crate::api_client::types::{
    PoolState, RoundPayout, RoundState, SessionSummary, TemplateState,
};
use crate::block::{Block, SessionStamp};
use crate::chain::{BlockAcceptor, Blockchain};
use crate::config::PoolConfig;
use crate::credentials::{CredentialError, CredentialStore};
use crate::job::JobDispatcher;
use crate::payout::{self, PayoutHistory};
use crate::protocol::{
    GetFullScratchpadRequest, GetFullScratchpadResponse, GetJobRequest, GetJobResponse,
    JobDetails, LoginRequest, LoginResponse, Status, SubmitShareRequest, SubmitShareResponse,
};
use crate::scratchpad::ScratchpadStore;
use crate::session::{Session, SessionId, SessionJob, SessionRegistry};
use crate::shares::{Commit, ShareLedger};
use crate::template::{
    PublishedTemplate, TemplateError, TemplateManager, TemplateRefresher, TemplateSource,
};
use crate::tracing::prelude::*;
use crate::types::{Difficulty, Hash};

#[derive(Debug, Error)]
#[error("invalid credentials for login {0:?}")]
pub struct AuthError(pub String);

pub struct Pool {
    chain: Arc<dyn Blockchain>,
    acceptor: Arc<dyn BlockAcceptor>,
    templates: Arc<TemplateManager>,
    scratchpad: Arc<ScratchpadStore>,
    credentials: Arc<CredentialStore>,
    dispatcher: JobDispatcher,
    ledger: ShareLedger,
    sessions: SessionRegistry,
    payouts: PayoutHistory,
    share_difficulty_ratio: u64,
    owner_fee_percent: u64,
    blocks_found: AtomicU64,
    started: Instant,
}

impl Pool {
    pub fn new(
        config: &PoolConfig,
        chain: Arc<dyn Blockchain>,
        acceptor: Arc<dyn BlockAcceptor>,
        credentials: CredentialStore,
    ) -> Self {
        let templates = Arc::new(TemplateManager::new());
        let scratchpad = Arc::new(ScratchpadStore::new(config.max_addendum_blocks));
        let dispatcher = JobDispatcher::new(
            Arc::clone(&chain),
            Arc::clone(&templates),
            Arc::clone(&scratchpad),
            config.share_difficulty_ratio,
        );
        Self {
            chain,
            acceptor,
            templates,
            scratchpad,
            credentials: Arc::new(credentials),
            dispatcher,
            ledger: ShareLedger::new(),
            sessions: SessionRegistry::new(),
            payouts: PayoutHistory::new(),
            share_difficulty_ratio: config.share_difficulty_ratio,
            owner_fee_percent: config.owner_fee_percent,
            blocks_found: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Load credentials from the configured file and publish the first
    /// template.
    pub fn from_config(
        config: &PoolConfig,
        chain: Arc<dyn Blockchain>,
        acceptor: Arc<dyn BlockAcceptor>,
    ) -> crate::error::Result<Self> {
        let path = config
            .credentials_file
            .as_deref()
            .ok_or(CredentialError::NoSource)?;
        let credentials = CredentialStore::load(path)?;
        let pool = Self::new(config, chain, acceptor, credentials);
        pool.start()?;
        Ok(pool)
    }

    fn template_source(&self) -> TemplateSource {
        TemplateSource {
            chain: Arc::clone(&self.chain),
            templates: Arc::clone(&self.templates),
            scratchpad: Arc::clone(&self.scratchpad),
            credentials: Arc::clone(&self.credentials),
        }
    }

    /// Load the scratchpad and publish the first template.
    pub fn start(&self) -> Result<Arc<PublishedTemplate>, TemplateError> {
        let published = self.template_source().refresh_after_tip_change()?;
        info!(
            height = published.height,
            difficulty = %published.difficulty,
            scratchpad = self.scratchpad.len(),
            "Pool ready"
        );
        Ok(published)
    }

    pub fn refresher(&self, tip_rx: watch::Receiver<u64>, interval: Duration) -> TemplateRefresher {
        TemplateRefresher::new(self.template_source(), tip_rx, interval)
    }

    /// Template version changes, one per publish.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.templates.subscribe()
    }

    pub fn templates(&self) -> &TemplateManager {
        &self.templates
    }

    pub fn scratchpad(&self) -> &ScratchpadStore {
        &self.scratchpad
    }

    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    pub fn login(
        &self,
        session: &mut Session,
        req: LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        if !self.credentials.authenticate(&req.login, &req.pass) {
            warn!(login = %req.login, peer = ?session.peer(), "Login rejected");
            self.end_session(session);
            session.reset();
            return Err(AuthError(req.login));
        }

        let id = session.authenticate(&req.login, &req.agent);
        info!(session = %id, login = %req.login, agent = %req.agent, "Miner logged in");

        let (status, job, addms) = match self.dispatcher.assign_job(session, &req.hi) {
            Ok(assignment) => (Status::Ok, assignment.job, assignment.addms),
            Err(e) => {
                debug!(session = %id, error = %e, "No job at login");
                (e.status(), JobDetails::default(), Vec::new())
            }
        };
        self.sessions.register(session);

        Ok(LoginResponse {
            status: status.into(),
            id: id.to_string(),
            job,
            addms,
        })
    }

    pub fn get_job(&self, session: &mut Session, req: GetJobRequest) -> GetJobResponse {
        let Some(id) = session.id().filter(|_| session.is_authenticated()) else {
            return GetJobResponse {
                status: Status::NotInitialized.into(),
                ..Default::default()
            };
        };

        match self.dispatcher.assign_job(session, &req.hi) {
            Ok(assignment) => {
                self.sessions.record_height(id, assignment.job.prev_hi.height);
                GetJobResponse {
                    jd: assignment.job,
                    addms: assignment.addms,
                    status: Status::Ok.into(),
                }
            }
            Err(e) => {
                debug!(session = %id, claimed = req.hi.height, error = %e, "Job request failed");
                GetJobResponse {
                    status: e.status().into(),
                    ..Default::default()
                }
            }
        }
    }

    pub fn get_full_scratchpad(
        &self,
        session: &mut Session,
        _req: GetFullScratchpadRequest,
    ) -> GetFullScratchpadResponse {
        let Some(auth) = session.authenticated_mut() else {
            return GetFullScratchpadResponse {
                status: Status::NotInitialized.into(),
                ..Default::default()
            };
        };

        let snapshot = self.scratchpad.full_copy();
        auth.last_assigned = snapshot.top;
        self.sessions.record_height(auth.id, snapshot.top.height);
        debug!(
            session = %auth.id,
            height = snapshot.top.height,
            entries = snapshot.hashes.len(),
            "Full scratchpad sent"
        );

        GetFullScratchpadResponse {
            hi: snapshot.top,
            scratchpad_hex: Hash::join_hex(&snapshot.hashes),
            status: Status::Ok.into(),
        }
    }

    pub fn submit_share(&self, session: &mut Session, req: SubmitShareRequest) -> SubmitShareResponse {
        let status = self.check_share(session, &req);
        SubmitShareResponse {
            status: status.into(),
        }
    }

    fn check_share(&self, session: &Session, req: &SubmitShareRequest) -> Status {
        let Some(auth) = session.authenticated() else {
            return Status::NotInitialized;
        };
        let Some(job) = auth.job.as_ref() else {
            return Status::NoJob;
        };
        // A round only closes when the tip moves, so work on an older tip
        // may belong to a round that has already been paid out.
        if !self.builds_on_tip(job) {
            debug!(session = %auth.id, nonce = req.nonce, height = job.height, "Share for stale job");
            self.sessions.record_share(auth.id, false);
            return Status::StaleJob;
        }

        let block = job.block.with_nonce(req.nonce);
        let hash = self
            .scratchpad
            .with_snapshot(|pad| self.chain.get_block_longhash(&block, job.height, pad));

        if !self.chain.check_hash(&hash, job.share_difficulty) {
            debug!(
                session = %auth.id,
                nonce = req.nonce,
                %hash,
                achieved = %Difficulty::from_hash(&hash),
                "Share below target"
            );
            self.sessions.record_share(auth.id, false);
            return Status::InsufficientDifficulty;
        }

        if self.ledger.try_commit(hash, &auth.login) == Commit::Duplicate {
            debug!(session = %auth.id, nonce = req.nonce, %hash, "Duplicate share");
            self.sessions.record_share(auth.id, false);
            return Status::DuplicateShare;
        }
        self.sessions.record_share(auth.id, true);
        trace!(
            session = %auth.id,
            login = %auth.login,
            job_id = %req.job_id,
            %hash,
            "Share accepted"
        );

        if self.chain.check_hash(&hash, job.block_difficulty) {
            self.block_found(&block, job.height, auth.id);
        }
        Status::Ok
    }

    fn builds_on_tip(&self, job: &SessionJob) -> bool {
        job.height == self.chain.get_current_height()
            && self.chain.get_block_id_by_height(job.height.saturating_sub(1))
                == Some(job.block.header.prev_id)
    }

    fn block_found(&self, block: &Block, height: u64, session: SessionId) {
        let block_id = block.id();
        let stamped = SessionStamp::parse(&block.miner_tx.extra.reserved);
        info!(height, id = %block_id, session = %session, stamped = ?stamped, "Block found");

        if !self.acceptor.handle_block_found(block) {
            warn!(height, id = %block_id, "Block rejected by daemon, round continues");
            return;
        }
        self.blocks_found.fetch_add(1, Ordering::Relaxed);

        let round = self.ledger.close_round();
        let reward = block.reward();
        let split = payout::calc_payments(reward, &round, self.owner_fee_percent);
        let credentials = self.credentials.snapshot();
        let (owner_amount, payments) = payout::resolve(split, credentials.owner_address(), |login| {
            credentials.get(login).map(|c| c.address.clone())
        });

        info!(
            round = round.number,
            height,
            reward,
            shares = round.total,
            owner_amount,
            "Round closed"
        );
        self.payouts.push(RoundPayout {
            round: round.number,
            height,
            block_id: block_id.to_string(),
            reward,
            total_shares: round.total,
            owner_amount,
            payments,
        });
    }

    /// Forget a session whose connection is gone.
    pub fn end_session(&self, session: &Session) {
        if let Some(id) = session.id() {
            self.sessions.remove(id);
        }
    }

    pub fn reload_credentials(&self) -> Result<usize, CredentialError> {
        self.credentials.reload()
    }

    pub fn state(&self) -> PoolState {
        let round = self.ledger.current();
        PoolState {
            uptime_secs: self.started.elapsed().as_secs(),
            template: self.templates.current().map(|t| TemplateState {
                height: t.height,
                version: t.version,
                prev_id: t.block.header.prev_id.to_string(),
                difficulty: t.difficulty.as_u64(),
                share_difficulty: t
                    .difficulty
                    .share_difficulty(self.share_difficulty_ratio)
                    .as_u64(),
            }),
            round: RoundState {
                number: round.number,
                total_shares: round.total,
                shares: round.per_login,
            },
            session_count: self.sessions.len(),
            blocks_found: self.blocks_found.load(Ordering::Relaxed),
        }
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.sessions.sessions()
    }

    pub fn rounds(&self) -> Vec<RoundPayout> {
        self.payouts.rounds()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::credentials::CredentialSet;
    use crate::credentials::tests::cred;
    use crate::devnet::DevChain;
    use crate::protocol::HeightInfo;

    pub(crate) const REWARD: u64 = 1_000_000;

    pub(crate) fn pool_on(chain: Arc<DevChain>) -> Pool {
        let credentials = CredentialStore::new(
            CredentialSet::new(
                "OWNER",
                vec![cred("alice", "a", "ADDR-A"), cred("bob", "b", "ADDR-B")],
            )
            .unwrap(),
        );
        let pool = Pool::new(&PoolConfig::default(), chain.clone(), chain, credentials);
        pool.start().unwrap();
        pool
    }

    fn login(pool: &Pool, login: &str, pass: &str, hi: HeightInfo) -> (Session, LoginResponse) {
        let mut session = Session::new(None);
        let resp = pool
            .login(
                &mut session,
                LoginRequest {
                    login: login.into(),
                    pass: pass.into(),
                    agent: "test-miner/1.0".into(),
                    hi,
                },
            )
            .unwrap();
        (session, resp)
    }

    fn submit(pool: &Pool, session: &mut Session, nonce: u64) -> String {
        pool.submit_share(
            session,
            SubmitShareRequest {
                id: String::new(),
                nonce,
                job_id: String::new(),
            },
        )
        .status
    }

    /// First nonce from `start` whose hash satisfies `pred` for this session's job.
    pub(crate) fn find_nonce(
        pool: &Pool,
        chain: &DevChain,
        session: &Session,
        start: u64,
        pred: impl Fn(&Hash) -> bool,
    ) -> u64 {
        let job = session.job().unwrap();
        let pad = pool.scratchpad().full_copy().hashes;
        (start..)
            .find(|&nonce| {
                let hash = chain.get_block_longhash(&job.block.with_nonce(nonce), job.height, &pad);
                pred(&hash)
            })
            .unwrap()
    }

    #[test]
    fn test_login_to_share_flow() {
        let chain = Arc::new(DevChain::new(Difficulty::from(1_000_000), REWARD));
        let pool = pool_on(chain.clone());

        let (mut session, resp) = login(&pool, "alice", "a", HeightInfo::default());
        assert_eq!(resp.status, "OK");
        assert!(resp.addms.is_empty());
        assert_eq!(resp.job.difficulty, Difficulty::from(10_000));
        assert_eq!(resp.id, session.id().unwrap().to_string());

        let share = Difficulty::from(10_000);
        let block = Difficulty::from(1_000_000);
        let nonce = find_nonce(&pool, &chain, &session, 0, |h| {
            share.is_met_by(h) && !block.is_met_by(h)
        });

        assert_eq!(submit(&pool, &mut session, nonce), "OK");
        assert_eq!(pool.ledger().len(), 1);

        assert_eq!(submit(&pool, &mut session, nonce), "duplicate share");
        assert_eq!(pool.ledger().len(), 1);
        assert!(pool.rounds().is_empty());
    }

    #[test]
    fn test_low_share_is_never_reported_duplicate() {
        let chain = Arc::new(DevChain::new(Difficulty::from(1_000_000), REWARD));
        let pool = pool_on(chain.clone());
        let (mut session, _) = login(&pool, "alice", "a", HeightInfo::default());

        let share = Difficulty::from(10_000);
        let nonce = find_nonce(&pool, &chain, &session, 0, |h| !share.is_met_by(h));

        assert_eq!(submit(&pool, &mut session, nonce), "insufficient difficulty");
        assert_eq!(submit(&pool, &mut session, nonce), "insufficient difficulty");
        assert!(pool.ledger().is_empty());
        assert_eq!(pool.sessions()[0].rejected_shares, 2);
    }

    #[test]
    fn test_operations_require_login() {
        let chain = Arc::new(DevChain::with_blocks(2));
        let pool = pool_on(chain);
        let mut session = Session::new(None);

        let resp = pool.get_job(&mut session, GetJobRequest::default());
        assert_eq!(resp.status, "session not initialized");
        let resp = pool.get_full_scratchpad(&mut session, GetFullScratchpadRequest::default());
        assert_eq!(resp.status, "session not initialized");
        assert!(resp.scratchpad_hex.is_empty());
        assert_eq!(submit(&pool, &mut session, 1), "session not initialized");
    }

    #[test]
    fn test_bad_password_leaves_no_state() {
        let chain = Arc::new(DevChain::with_blocks(2));
        let pool = pool_on(chain);
        let mut session = Session::new(None);

        let err = pool
            .login(
                &mut session,
                LoginRequest {
                    login: "alice".into(),
                    pass: "wrong".into(),
                    agent: String::new(),
                    hi: HeightInfo::default(),
                },
            )
            .unwrap_err();
        assert_eq!(err.0, "alice");
        assert!(!session.is_authenticated());
        assert!(pool.sessions().is_empty());
    }

    #[test]
    fn test_full_scratchpad_then_job() {
        let chain = Arc::new(DevChain::with_blocks(30));
        let pool = pool_on(chain.clone());

        let (mut session, resp) = login(&pool, "bob", "b", HeightInfo::default());
        assert_eq!(resp.status, "full scratchpad required");
        assert!(session.is_authenticated());

        let full = pool.get_full_scratchpad(&mut session, GetFullScratchpadRequest::default());
        assert_eq!(full.status, "OK");
        assert_eq!(full.hi, chain.top());
        let (_, expected) = chain.get_scratchpad().unwrap();
        assert_eq!(Hash::split_hex(&full.scratchpad_hex).unwrap(), expected);

        let job = pool.get_job(&mut session, GetJobRequest { id: String::new(), hi: full.hi });
        assert_eq!(job.status, "OK");
        assert!(job.addms.is_empty());
        assert_eq!(job.jd.prev_hi, full.hi);
    }

    #[test]
    fn test_job_height_contract_across_tip_changes() {
        let chain = Arc::new(DevChain::with_blocks(4));
        let pool = pool_on(chain.clone());
        let (mut session, resp) = login(&pool, "alice", "a", chain.top());
        assert_eq!(resp.status, "OK");
        let first_version = resp.job.job_id.clone();

        chain.mine_blocks(2);
        pool.template_source().refresh_after_tip_change().unwrap();

        let old_tip = resp.job.prev_hi;
        let job = pool.get_job(&mut session, GetJobRequest { id: String::new(), hi: old_tip });
        assert_eq!(job.status, "OK");
        assert_eq!(job.addms.len(), 2);
        assert_ne!(job.jd.job_id, first_version);

        let sent = session.job().unwrap();
        let assigned = session.authenticated().unwrap().last_assigned;
        assert_eq!(sent.height, assigned.height + 1);
        assert_eq!(assigned, chain.top());
    }

    #[test]
    fn test_accepted_block_closes_round() {
        // Share difficulty 1: every hash is a share, about 1 in 100 is a block
        let chain = Arc::new(DevChain::new(Difficulty::from(100), REWARD));
        chain.mine_blocks(2);
        let pool = pool_on(chain.clone());
        let (mut alice, _) = login(&pool, "alice", "a", chain.top());
        let (mut bob, _) = login(&pool, "bob", "b", chain.top());

        let block = Difficulty::from(100);
        let mut nonce = 0;
        for _ in 0..3 {
            nonce = find_nonce(&pool, &chain, &alice, nonce + 1, |h| !block.is_met_by(h));
            assert_eq!(submit(&pool, &mut alice, nonce), "OK");
        }
        let mut nonce = 0;
        for _ in 0..2 {
            nonce = find_nonce(&pool, &chain, &bob, nonce + 1, |h| !block.is_met_by(h));
            assert_eq!(submit(&pool, &mut bob, nonce), "OK");
        }
        let winning = find_nonce(&pool, &chain, &bob, 0, |h| block.is_met_by(h));
        let top_before = chain.top().height;

        assert_eq!(submit(&pool, &mut bob, winning), "OK");

        assert_eq!(chain.top().height, top_before + 1);
        assert!(pool.ledger().is_empty());
        assert_eq!(pool.state().round.number, 2);
        assert_eq!(pool.state().blocks_found, 1);

        let rounds = pool.rounds();
        assert_eq!(rounds.len(), 1);
        let round = &rounds[0];
        assert_eq!(round.total_shares, 6);
        assert_eq!(round.reward, REWARD);
        assert_eq!(round.payments.iter().map(|p| p.amount).sum::<u64>(), REWARD);
        let bob_paid = round.payments.iter().find(|p| p.login == "bob").unwrap();
        assert_eq!(bob_paid.address, "ADDR-B");
        assert_eq!(bob_paid.amount, 3 * (REWARD - REWARD * 3 / 100) / 6);
        assert_eq!(round.payments.last().unwrap().address, "OWNER");
    }

    #[test]
    fn test_rejected_block_keeps_round_open() {
        let chain = Arc::new(DevChain::new(Difficulty::from(100), REWARD));
        chain.mine_blocks(2);
        let pool = pool_on(chain.clone());
        let (mut alice, _) = login(&pool, "alice", "a", chain.top());

        let block = Difficulty::from(100);
        let winning = find_nonce(&pool, &chain, &alice, 0, |h| block.is_met_by(h));
        // The daemon now wants more work than the template advertised
        chain.set_difficulty(Difficulty::MAX);

        assert_eq!(submit(&pool, &mut alice, winning), "OK");
        assert_eq!(pool.ledger().len(), 1);
        assert_eq!(pool.state().round.number, 1);
        assert!(pool.rounds().is_empty());
        assert!(chain.accepted_blocks().is_empty());
    }

    #[test]
    fn test_work_from_closed_round_is_not_credited_again() {
        let chain = Arc::new(DevChain::new(Difficulty::from(100), REWARD));
        chain.mine_blocks(2);
        let pool = pool_on(chain.clone());
        let (mut alice, _) = login(&pool, "alice", "a", chain.top());
        let (mut bob, _) = login(&pool, "bob", "b", chain.top());

        let block = Difficulty::from(100);
        let mut nonces = Vec::new();
        let mut nonce = 0;
        for _ in 0..3 {
            nonce = find_nonce(&pool, &chain, &alice, nonce + 1, |h| !block.is_met_by(h));
            assert_eq!(submit(&pool, &mut alice, nonce), "OK");
            nonces.push(nonce);
        }
        let winning = find_nonce(&pool, &chain, &bob, 0, |h| block.is_met_by(h));
        assert_eq!(submit(&pool, &mut bob, winning), "OK");
        assert_eq!(pool.state().round.number, 2);

        for nonce in nonces {
            assert_eq!(submit(&pool, &mut alice, nonce), "stale job");
        }
        assert_eq!(submit(&pool, &mut bob, winning), "stale job");
        assert!(pool.ledger().is_empty());
        assert_eq!(chain.accepted_blocks().len(), 1);

        // A fresh job earns credit in the new round
        pool.template_source().refresh_after_tip_change().unwrap();
        let job = pool.get_job(&mut alice, GetJobRequest { id: String::new(), hi: chain.top() });
        assert_eq!(job.status, "OK");
        let nonce = find_nonce(&pool, &chain, &alice, 0, |h| !block.is_met_by(h));
        assert_eq!(submit(&pool, &mut alice, nonce), "OK");
        assert_eq!(pool.state().round.shares.get("alice"), Some(&1));
    }

    #[test]
    fn test_racing_submissions_of_one_hash() {
        let chain = Arc::new(DevChain::new(Difficulty::from(1_000_000), REWARD));
        let pool = Arc::new(pool_on(chain.clone()));
        let (session, _) = login(&pool, "alice", "a", HeightInfo::default());

        let share = Difficulty::from(10_000);
        let block = Difficulty::from(1_000_000);
        let nonce = find_nonce(&pool, &chain, &session, 0, |h| {
            share.is_met_by(h) && !block.is_met_by(h)
        });

        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let barrier = Arc::clone(&barrier);
                let mut session = session.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    submit(&pool, &mut session, nonce)
                })
            })
            .collect();

        let statuses: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(statuses.iter().filter(|s| *s == "OK").count(), 1);
        assert_eq!(statuses.iter().filter(|s| *s == "duplicate share").count(), 7);
        assert_eq!(pool.ledger().len(), 1);
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let chain = Arc::new(DevChain::with_blocks(1));
        let err = Pool::from_config(&PoolConfig::default(), chain.clone(), chain)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::error::Error::Credentials(CredentialError::NoSource)
        ));
    }

    #[test]
    fn test_from_config_fails_without_template() {
        let path = crate::credentials::tests::temp_file(r#"{"owner_address":"OWNER"}"#);
        let config = PoolConfig {
            credentials_file: Some(path.clone()),
            ..Default::default()
        };
        let chain = Arc::new(DevChain::with_blocks(1));
        chain.fail_templates(true);

        let err = Pool::from_config(&config, chain.clone(), chain).err().unwrap();
        assert!(matches!(err, crate::error::Error::Template(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_state_and_session_listing() {
        let chain = Arc::new(DevChain::with_blocks(3));
        let pool = pool_on(chain.clone());
        let (alice, _) = login(&pool, "alice", "a", chain.top());

        let state = pool.state();
        let template = state.template.unwrap();
        assert_eq!(template.height, 4);
        assert_eq!(template.version, 1);
        assert_eq!(template.share_difficulty, 10);
        assert_eq!(state.session_count, 1);

        let sessions = pool.sessions();
        assert_eq!(sessions[0].login, "alice");
        assert_eq!(sessions[0].last_height, 3);

        pool.end_session(&alice);
        assert!(pool.sessions().is_empty());
    }
}
