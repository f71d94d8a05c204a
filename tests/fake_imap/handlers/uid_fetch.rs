//! UID FETCH command handler.
//!
//! The gateway only ever asks for `(UID BODY.PEEK[HEADER])`, so that is
//! what the fake server returns, as a **counted literal**:
//!
//! ```text
//! * <seq> FETCH (UID <uid> BODY[HEADER] {<length>}
//! <exactly length bytes of header block>
//! )
//! ```
//!
//! The `{length}\r\n` is an IMAP literal marker. It tells the client:
//! "the next `length` bytes are raw data, not IMAP protocol text."
//! After reading those bytes, the client expects the closing `)`.
//! `BODY.PEEK` is answered as plain `BODY`, per RFC 3501.
//!
//! The sequence number is the 1-based index of the message within the
//! folder, per RFC 3501 Section 7.4.2.

use crate::fake_imap::io::{write_bytes, write_line};
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Extract UIDs from a `SequenceSet`. Single values and bounded ranges
/// are supported; `*` is not.
fn extract_uids(seq_set: &SequenceSet) -> Vec<u32> {
    seq_set
        .0
        .as_ref()
        .iter()
        .flat_map(|seq| match seq {
            Sequence::Single(SeqOrUid::Value(v)) => vec![v.get()],
            Sequence::Range(SeqOrUid::Value(a), SeqOrUid::Value(b)) => {
                (a.get().min(b.get())..=a.get().max(b.get())).collect()
            }
            _ => vec![],
        })
        .collect()
}

/// Handle the UID FETCH command. Returns the header block of every
/// requested message that exists; unknown UIDs are skipped silently.
pub async fn handle_uid_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} BAD Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    for uid in extract_uids(sequence_set) {
        let Some((idx, email)) = folder.emails.iter().enumerate().find(|(_, e)| e.uid == uid)
        else {
            continue;
        };
        let seq = idx + 1;
        let header = email.header();

        let prefix = format!(
            "* {seq} FETCH (UID {uid} BODY[HEADER] {{{}}}\r\n",
            header.len()
        );
        if write_line(stream, &prefix).await.is_err()
            || write_bytes(stream, header).await.is_err()
            || write_line(stream, ")\r\n").await.is_err()
        {
            return;
        }
    }

    let resp = format!("{tag} OK FETCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use std::num::NonZeroU32;
    use tokio::io::BufReader;

    fn make_raw_email() -> Vec<u8> {
        b"From: a@b.com\r\nSubject: Test\r\n\r\nBody text".to_vec()
    }

    fn uid_set(uids: &[u32]) -> SequenceSet {
        SequenceSet(
            uids.iter()
                .map(|uid| Sequence::Single(SeqOrUid::Value(NonZeroU32::new(*uid).unwrap())))
                .collect::<Vec<_>>()
                .try_into()
                .unwrap(),
        )
    }

    async fn run(sequence_set: &SequenceSet, mailbox: &Mailbox, selected: Option<&str>) -> String {
        let (client, server) = tokio::io::duplex(4096);
        let mut stream = BufReader::new(server);

        handle_uid_fetch("A1", sequence_set, mailbox, selected, &mut stream).await;
        drop(stream);

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
            .await
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn returns_header_without_body() {
        let raw = make_raw_email();
        let mailbox = MailboxBuilder::new().folder("INBOX").email(42, &raw).build();

        let output = run(&uid_set(&[42]), &mailbox, Some("INBOX")).await;

        assert!(output.contains("* 1 FETCH (UID 42 BODY[HEADER] {32}\r\n"));
        assert!(output.contains("From: a@b.com\r\nSubject: Test\r\n\r\n)"));
        assert!(!output.contains("Body text"));
        assert!(output.ends_with("A1 OK FETCH completed\r\n"));
    }

    #[tokio::test]
    async fn fetches_several_uids_in_request_order() {
        let raw = make_raw_email();
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(3, &raw)
            .email(7, &raw)
            .build();

        let output = run(&uid_set(&[7, 3]), &mailbox, Some("INBOX")).await;

        let seven = output.find("(UID 7 ").unwrap();
        let three = output.find("(UID 3 ").unwrap();
        assert!(seven < three);
        assert!(output.contains("* 2 FETCH (UID 7 "));
    }

    #[tokio::test]
    async fn missing_uid_returns_only_ok() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run(&uid_set(&[99]), &mailbox, Some("INBOX")).await;

        assert_eq!(output, "A1 OK FETCH completed\r\n");
    }

    #[tokio::test]
    async fn no_folder_selected_returns_bad() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = run(&uid_set(&[1]), &mailbox, None).await;

        assert!(output.contains("A1 BAD No folder selected"));
    }
}
