//! # Topic Transactions
//!
//! A transaction is a body plus a signature map. Every signature covers the
//! same canonical body bytes: the transaction id followed by a tagged,
//! length-prefixed encoding of the body.

use shared_crypto::{PrivateKey, PublicKey, Signature};
use shared_types::{ChunkInfo, TopicId, TransactionId};

/// What a transaction does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionBody {
    /// Create a topic.
    TopicCreate {
        memo: String,
        admin_key: Option<PublicKey>,
        submit_key: Option<PublicKey>,
    },
    /// Submit one message (or one chunk of a message) to a topic.
    TopicMessageSubmit {
        topic_id: TopicId,
        message: Vec<u8>,
        chunk_info: Option<ChunkInfo>,
    },
    /// Delete a topic.
    TopicDelete { topic_id: TopicId },
}

impl TransactionBody {
    /// Short name for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TopicCreate { .. } => "topic_create",
            Self::TopicMessageSubmit { .. } => "topic_message_submit",
            Self::TopicDelete { .. } => "topic_delete",
        }
    }

    /// Topic the transaction targets, if it already exists.
    #[must_use]
    pub fn topic_id(&self) -> Option<TopicId> {
        match self {
            Self::TopicCreate { .. } => None,
            Self::TopicMessageSubmit { topic_id, .. } | Self::TopicDelete { topic_id } => {
                Some(*topic_id)
            }
        }
    }
}

/// One entry of the signature map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// A signed transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub body: TransactionBody,
    pub signatures: Vec<SignaturePair>,
}

impl Transaction {
    /// Unsigned transaction.
    #[must_use]
    pub fn new(transaction_id: TransactionId, body: TransactionBody) -> Self {
        Self {
            transaction_id,
            body,
            signatures: Vec::new(),
        }
    }

    /// Canonical bytes every signature covers.
    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(&self.transaction_id.to_bytes());

        match &self.body {
            TransactionBody::TopicCreate {
                memo,
                admin_key,
                submit_key,
            } => {
                out.push(1);
                put_bytes(&mut out, memo.as_bytes());
                put_key(&mut out, admin_key.as_ref());
                put_key(&mut out, submit_key.as_ref());
            }
            TransactionBody::TopicMessageSubmit {
                topic_id,
                message,
                chunk_info,
            } => {
                out.push(2);
                out.extend_from_slice(&topic_id.0.to_bytes());
                put_bytes(&mut out, message);
                match chunk_info {
                    Some(info) => {
                        out.push(1);
                        out.extend_from_slice(&info.initial_transaction_id.to_bytes());
                        out.extend_from_slice(&info.total.to_be_bytes());
                        out.extend_from_slice(&info.number.to_be_bytes());
                    }
                    None => out.push(0),
                }
            }
            TransactionBody::TopicDelete { topic_id } => {
                out.push(3);
                out.extend_from_slice(&topic_id.0.to_bytes());
            }
        }

        out
    }

    /// Add a signature by `key`. Signing twice with the same key is a no-op.
    pub fn sign_with(&mut self, key: &PrivateKey) {
        let public_key = key.public_key();
        if self.signatures.iter().any(|pair| pair.public_key == public_key) {
            return;
        }
        let signature = key.sign(&self.body_bytes());
        self.signatures.push(SignaturePair {
            public_key,
            signature,
        });
    }

    /// Builder form of `sign_with`.
    #[must_use]
    pub fn signed_with(mut self, key: &PrivateKey) -> Self {
        self.sign_with(key);
        self
    }

    /// Whether the signature map holds a valid signature by `key`.
    #[must_use]
    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        let body = self.body_bytes();
        self.signatures
            .iter()
            .filter(|pair| pair.public_key == *key)
            .any(|pair| key.verify(&body, &pair.signature).is_ok())
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
}

fn put_key(out: &mut Vec<u8>, key: Option<&PublicKey>) {
    match key {
        Some(key) => {
            out.push(1);
            put_bytes(out, &key.to_bytes());
        }
        None => out.push(0),
    }
}
