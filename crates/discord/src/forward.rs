//! Delivery of forwarded bundles.
//!
//! Discord has no native forward container. A bundle is folded into one
//! message when the result fits a single message, otherwise each node is
//! sent on its own, in order.

use std::future::Future;

use crate::{Result, codec::Encoded};

/// Content limit of one native message, in characters.
pub const MAX_CONTENT_CHARS: usize = 2000;
/// Attachment limit of one native message.
pub const MAX_ATTACHMENTS: usize = 10;

fn fits_one_message(chars: usize, attachments: usize) -> bool {
    chars <= MAX_CONTENT_CHARS && attachments <= MAX_ATTACHMENTS
}

/// How a bundle will be delivered.
#[derive(Debug)]
pub enum Delivery {
    Folded(Encoded),
    Sequential(Vec<Encoded>),
}

/// Decide between one folded message and per-node sends. Nodes that encode
/// to nothing are dropped.
pub fn plan(parts: Vec<Encoded>) -> Delivery {
    let parts: Vec<Encoded> = parts
        .into_iter()
        .filter(|part| !part.payload.is_empty())
        .collect();

    let non_empty_text = parts
        .iter()
        .filter(|part| !part.payload.content.is_empty())
        .count();
    let chars: usize = parts
        .iter()
        .map(|part| part.payload.content_chars())
        .sum::<usize>()
        + non_empty_text.saturating_sub(1);
    let attachments: usize = parts.iter().map(|part| part.payload.attachments.len()).sum();

    if !fits_one_message(chars, attachments) {
        return Delivery::Sequential(parts);
    }

    let mut folded = Encoded::default();
    for part in parts {
        folded.append(part);
    }
    Delivery::Folded(folded)
}

/// Send each item in order, collecting the results. Stops at the first
/// failure.
pub async fn expand<I, T, F, Fut>(items: I, mut send: F) -> Result<Vec<T>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut results = Vec::new();
    for item in items {
        results.push(send(item).await?);
    }
    Ok(results)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            Error,
            transport::{FileData, OutboundAttachment, OutboundPayload},
        },
        dcbridge_channels::{ForwardNode, MessageSegment},
        std::sync::Mutex,
    };

    fn part(text: &str, attachments: usize) -> Encoded {
        Encoded {
            payload: OutboundPayload {
                content: text.into(),
                attachments: (0..attachments)
                    .map(|i| OutboundAttachment {
                        name: format!("{i}.png"),
                        data: FileData::Bytes(vec![0]),
                    })
                    .collect(),
                reply_to: None,
            },
            log: text.into(),
        }
    }

    #[test]
    fn small_bundles_fold() {
        let Delivery::Folded(folded) = plan(vec![part("a", 1), part("", 0), part("b", 2)]) else {
            panic!("expected a folded delivery");
        };
        assert_eq!(folded.payload.content, "a\nb");
        assert_eq!(folded.payload.attachments.len(), 3);
        assert!(folded.payload.content_chars() <= MAX_CONTENT_CHARS);
    }

    #[test]
    fn too_many_attachments_go_sequential() {
        let Delivery::Sequential(parts) = plan(vec![part("a", 6), part("b", 5)]) else {
            panic!("expected sequential delivery");
        };
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn long_text_goes_sequential() {
        let long = "x".repeat(MAX_CONTENT_CHARS);
        assert!(matches!(
            plan(vec![part(&long, 0), part("y", 0)]),
            Delivery::Sequential(_)
        ));
        assert!(matches!(plan(vec![part(&long, 0)]), Delivery::Folded(_)));
    }

    #[tokio::test]
    async fn expand_sends_every_node_in_order() {
        let nodes = vec![
            ForwardNode::new(vec![MessageSegment::text("first")]),
            ForwardNode::new(vec![MessageSegment::text("second")]),
            ForwardNode::new(vec![MessageSegment::text("third")]),
        ];
        let seen = Mutex::new(Vec::new());

        let results = expand(nodes, |node| {
            let seen = &seen;
            async move {
                let mut seen = seen.lock().unwrap();
                seen.push(node.message);
                Ok(seen.len())
            }
        })
        .await
        .unwrap();

        assert_eq!(results, vec![1, 2, 3]);
        assert_eq!(seen.into_inner().unwrap()[1], vec![MessageSegment::text(
            "second"
        )]);
    }

    #[tokio::test]
    async fn expand_stops_at_first_failure() {
        let mut calls = 0;
        let result = expand(1..=3, |n| {
            calls += 1;
            async move {
                if n == 2 {
                    Err(Error::transport("boom"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
