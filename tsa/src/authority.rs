//! Local timestamp authority: turns a TimeStampReq into a TimeStampResp.
//!
//! Request flow:
//!   parse -> validate -> TSTInfo -> signedAttrs -> sign -> SignedData -> response
//!
//! Any failure yields a rejection response rather than an error, so the
//! requester always sees a well-formed TimeStampResp.

use crate::cms::{build_signed_data, CmsConfig, SignerComponents};
use crate::policy::TsaPolicy;
use crate::response::{build_timestamp_resp_rejection, build_timestamp_resp_success};
use crate::rfc3161::{validate_request, RejectReason, TimeStampReq};
use crate::signed_attrs::build_signed_attrs;
use crate::signing::SignerIdentity;
use crate::time::{format_generalized_time, Clock, SystemClock};
use crate::tstinfo::{build_tstinfo, TstInfoParams};

/// A self-issued timestamp authority backed by one signer identity.
pub struct LocalTsa<C: Clock = SystemClock> {
    identity: SignerIdentity,
    policy: TsaPolicy,
    clock: C,
}

impl LocalTsa<SystemClock> {
    pub fn new(identity: SignerIdentity, policy: TsaPolicy) -> Self {
        Self::with_clock(identity, policy, SystemClock)
    }
}

impl<C: Clock> LocalTsa<C> {
    pub fn with_clock(identity: SignerIdentity, policy: TsaPolicy, clock: C) -> Self {
        Self {
            identity,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &TsaPolicy {
        &self.policy
    }

    pub fn identity(&self) -> &SignerIdentity {
        &self.identity
    }

    /// Answer a DER-encoded query with a DER-encoded TimeStampResp.
    pub fn respond(&self, query_der: &[u8]) -> Vec<u8> {
        let result = TimeStampReq::from_der(query_der).and_then(|req| self.issue(&req));
        match result {
            Ok(token) => build_timestamp_resp_success(&token),
            Err(reason) => {
                log::warn!("timestamp request rejected: {}", reason);
                build_timestamp_resp_rejection(reason)
            }
        }
    }

    /// Issue a timestamp token (CMS ContentInfo) for a parsed request.
    pub fn issue(&self, req: &TimeStampReq) -> Result<Vec<u8>, RejectReason> {
        validate_request(req, &self.policy)?;

        let now = self.clock.unix_secs();
        let certificate = self.identity.certificate();
        let serial_number = self.policy.serial_number();

        let tstinfo_der = build_tstinfo(&TstInfoParams {
            policy_oid: self.policy.select_policy(req.policy_oid.as_deref()),
            hash_algorithm: req.hash_algorithm,
            digest: &req.message_digest,
            serial_number,
            gen_time: format_generalized_time(now),
            accuracy_secs: self.policy.accuracy_secs,
            ordering: self.policy.ordering,
            nonce: req.nonce.as_deref(),
            tsa_name: self.policy.tsa_name.then(|| certificate.subject_der()),
        });

        let cert_id = certificate.ess_cert_id(self.policy.ess_cert_id_alg);
        let signed_attrs_der = build_signed_attrs(&tstinfo_der, now, &cert_id);

        let signature = self.identity.sign(&signed_attrs_der).map_err(|e| {
            log::error!("signing error: {}", e);
            RejectReason::SystemFailure
        })?;

        log::debug!("issued timestamp token serial {}", serial_number);

        Ok(build_signed_data(
            &CmsConfig {
                signer_cert_der: req.cert_req.then(|| certificate.der()),
                issuer_der: certificate.issuer_der(),
                serial_number_der: certificate.serial_number_der(),
                signature_algorithm_der: self.identity.key().signature_algorithm_der(),
            },
            &SignerComponents {
                tstinfo_der,
                signed_attrs_der,
                signature,
            },
        ))
    }
}
