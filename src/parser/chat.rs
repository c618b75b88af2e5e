//! Full transcript parsing.
//!
//! Takes the raw text of a WhatsApp export and produces a [`ParsedChat`]:
//! header lines start new messages, unrecognized lines are merged into the
//! previous message, and every message gets a deterministic ID so that
//! bookmarks survive re-imports of the same export.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::message::{ChatMessage, MediaType, ParsedChat};
use crate::parser::line::parse_line;

/// Placeholder and attachment phrases WhatsApp writes for media messages,
/// across the locales the app exports in. All lowercase.
const MEDIA_INDICATORS: &[&str] = &[
    "<media omitted>",
    "<mídia oculta>",
    "<médias omis>",
    "<medien ausgelassen>",
    "<medien weggelaten>",
    "<archivo omitido>",
    "<media eliminati>",
    "<メディアなし>",
    "<媒体省略>",
    "<미디어 생략>",
    "<медиа пропущены>",
    "(file attached)",
    "(arquivo anexado)",
    "(fichier joint)",
    "(datei angehängt)",
    "(archivo adjunto)",
    "(file allegato)",
    "(bestand bijgevoegd)",
    "(ファイル添付)",
    "(附件)",
    "(файл прикреплен)",
    "image omitted",
    "video omitted",
    "audio omitted",
    "sticker omitted",
    "gif omitted",
    "document omitted",
    "contact card omitted",
    ".jpg (file attached)",
    ".png (file attached)",
    ".mp4 (file attached)",
    ".opus (file attached)",
    ".pdf (file attached)",
    ".webp (file attached)",
    ".jpg (arquivo anexado)",
    ".png (arquivo anexado)",
    ".mp4 (arquivo anexado)",
    ".opus (arquivo anexado)",
    ".pdf (arquivo anexado)",
    ".webp (arquivo anexado)",
    ".vcf (arquivo anexado)",
    ".jpg (fichier joint)",
    ".png (fichier joint)",
    ".jpg (datei angehängt)",
    ".png (datei angehängt)",
    ".jpg (archivo adjunto)",
    ".png (archivo adjunto)",
];

/// Phrases appearing in group housekeeping notices. A message containing
/// one of these is a system message even when a sender was recognized.
/// All lowercase.
const SYSTEM_INDICATORS: &[&str] = &[
    // English
    "joined using this group's invite link",
    "created group",
    "added",
    "removed",
    "left",
    "changed the subject",
    "changed this group's icon",
    "changed the group description",
    "deleted this group",
    "messages and calls are end-to-end encrypted",
    "you created group",
    "security code changed",
    "turned on disappearing messages",
    "turned off disappearing messages",
    // Portuguese
    "as mensagens e ligações são protegidas com a criptografia",
    "você criou este grupo",
    "criou este grupo",
    "adicionou",
    "saiu",
    "foi removido",
    "mudou a imagem deste grupo",
    "mudou o assunto",
    "entrou usando o link",
    // Spanish
    "se unió usando el enlace de invitación",
    "creó el grupo",
    "agregó",
    "eliminó",
    "salió",
    "cambió el asunto",
    "cambió la foto del grupo",
    "eliminó la foto del grupo",
    "los mensajes y las llamadas están cifrados",
    // French
    "a rejoint en utilisant le lien",
    "a créé le groupe",
    "a ajouté",
    "a retiré",
    "a quitté",
    "a modifié le sujet",
    "a changé la photo du groupe",
    "les messages et les appels sont protégés",
    // German
    "ist über einladungslink beigetreten",
    "hat die gruppe erstellt",
    "hinzugefügt",
    "entfernt",
    "hat die gruppe verlassen",
    "hat den betreff geändert",
    "hat das gruppenbild geändert",
    "nachrichten und anrufe sind ende-zu-ende-verschlüsselt",
    // Italian
    "si è unito tramite link di invito",
    "ha creato il gruppo",
    "ha aggiunto",
    "ha rimosso",
    "ha abbandonato",
    "ha modificato l'oggetto",
    "ha cambiato l'immagine del gruppo",
    "i messaggi e le chiamate sono crittografati",
    // Dutch
    "heeft deelgenomen via uitnodigingslink",
    "heeft groep gemaakt",
    "heeft toegevoegd",
    "heeft verwijderd",
    "heeft de groep verlaten",
    "heeft het onderwerp gewijzigd",
    "heeft de groepsfoto gewijzigd",
    "berichten en oproepen zijn end-to-end versleuteld",
];

/// Filename prefixes WhatsApp uses when naming an export, per locale.
const TITLE_PREFIXES: &[&str] = &[
    "WhatsApp Chat with ",
    "WhatsApp Chat - ",
    "Conversa do WhatsApp com ",
    "Chat do WhatsApp com ",
];

pub(crate) fn is_media_message(content: &str) -> bool {
    let lower = content.to_lowercase();
    MEDIA_INDICATORS.iter().any(|ind| lower.contains(ind))
}

pub(crate) fn is_system_message(content: &str) -> bool {
    let lower = content.to_lowercase();
    SYSTEM_INDICATORS.iter().any(|ind| lower.contains(ind))
}

/// Infers the media category from message text. The checks run in fixed
/// precedence order, so e.g. `photo.jpg (file attached)` is an image even
/// though it also matches the generic document keyword list.
pub(crate) fn detect_media_type(content: &str) -> Option<MediaType> {
    let lower = content.to_lowercase();

    if lower.contains(".jpg") || lower.contains(".png") || lower.contains(".jpeg") {
        return Some(MediaType::Image);
    }
    if lower.contains(".mp4") || lower.contains(".mov") || lower.contains("video") {
        return Some(MediaType::Video);
    }
    if lower.contains(".opus")
        || lower.contains(".mp3")
        || lower.contains("audio")
        || lower.contains("ptt-")
        || lower.contains("aud-")
    {
        return Some(MediaType::Audio);
    }
    if lower.contains(".webp") || lower.contains("sticker") || lower.contains("stk-") {
        return Some(MediaType::Sticker);
    }
    if lower.contains("contact card") || lower.contains(".vcf") {
        return Some(MediaType::Contact);
    }
    if lower.contains("location:") || lower.contains("live location") {
        return Some(MediaType::Location);
    }
    if lower.contains(".pdf")
        || lower.contains(".doc")
        || lower.contains(".xml")
        || lower.contains(".svg")
        || lower.contains("document")
    {
        return Some(MediaType::Document);
    }

    None
}

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// djb2 over the UTF-16 code units of the input, with 32-bit signed
/// wrapping arithmetic, rendered as base-36. The exact arithmetic is part
/// of the ID contract: bookmark files store these IDs, so the hash must
/// stay stable across versions.
fn djb2_base36(input: &str) -> String {
    let mut hash: i32 = 5381;
    for unit in input.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_add(hash) ^ i32::from(unit);
    }
    to_base36(hash.unsigned_abs())
}

/// Derives the deterministic message ID from its identity triple.
///
/// Collisions within one chat append `_1`, `_2`, ... in parse order, which
/// keeps IDs unique while staying reproducible for identical input.
pub(crate) fn generate_deterministic_id(
    timestamp: NaiveDateTime,
    sender: &str,
    content: &str,
    existing_ids: &HashSet<String>,
) -> String {
    let base_string = format!(
        "{}|{}|{}",
        timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        sender,
        content
    );
    let id = djb2_base36(&base_string);

    if !existing_ids.contains(&id) {
        return id;
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{id}_{counter}");
        if !existing_ids.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Derives the chat title from the export filename: strips the `.txt`
/// extension and the locale-specific `WhatsApp Chat with ` style prefixes.
pub(crate) fn title_from_filename(filename: &str) -> String {
    let mut title = filename;
    if let Some(stem) = strip_suffix_ci(title, ".txt") {
        title = stem;
    }
    for prefix in TITLE_PREFIXES {
        if let Some(rest) = strip_prefix_ci(title, prefix) {
            title = rest;
        }
    }
    title.trim().to_string()
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() >= suffix.len() && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix) {
        Some(&s[..s.len() - suffix.len()])
    } else {
        None
    }
}

/// Parses a WhatsApp chat export into messages, participants and metadata.
///
/// `filename` is the name of the transcript file inside the archive; it
/// seeds the chat title. When the title stays generic the first three
/// participants stand in, with a `+N` overflow marker.
///
/// # Example
///
/// ```rust
/// use zapview::parser::parse_chat;
///
/// let chat = parse_chat(
///     "15/01/2024, 10:30 - Alice: Hi\n15/01/2024, 10:31 - Bob: Hello",
///     "WhatsApp Chat with Alice.txt",
/// );
/// assert_eq!(chat.message_count, 2);
/// assert_eq!(chat.title, "Alice");
/// ```
pub fn parse_chat(content: &str, filename: &str) -> ParsedChat {
    let mut messages: Vec<ChatMessage> = Vec::new();
    let mut participants: HashSet<String> = HashSet::new();
    let mut used_ids: HashSet<String> = HashSet::new();
    let mut current: Option<ChatMessage> = None;

    let mut finalize = |message: Option<ChatMessage>, messages: &mut Vec<ChatMessage>| {
        if let Some(mut msg) = message {
            // Continuation lines may carry the filename hint, so the
            // media type is only known once the message is complete.
            if msg.is_media_message {
                msg.media_type = detect_media_type(&msg.content);
            }
            msg.id =
                generate_deterministic_id(msg.timestamp, &msg.sender, &msg.content, &used_ids);
            used_ids.insert(msg.id.clone());
            messages.push(msg);
        }
    };

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(parsed) = parse_line(line) {
            finalize(current.take(), &mut messages);

            let is_media = is_media_message(&parsed.content);
            let is_system = parsed.sender.is_empty() || is_system_message(&parsed.content);

            if !parsed.sender.is_empty() && !is_system {
                participants.insert(parsed.sender.clone());
            }

            current = Some(ChatMessage {
                id: String::new(),
                timestamp: parsed.timestamp,
                sender: parsed.sender,
                media_type: None,
                content: parsed.content,
                is_system_message: is_system,
                is_media_message: is_media,
                raw_line: line.to_string(),
                media_path: None,
            });
        } else if let Some(msg) = current.as_mut() {
            // Continuation of a multiline message.
            msg.content.push('\n');
            msg.content.push_str(line);
            msg.raw_line.push('\n');
            msg.raw_line.push_str(line);
        }
        // Orphan continuation before any header is dropped.
    }
    finalize(current.take(), &mut messages);

    let mut participants: Vec<String> = participants.into_iter().collect();
    participants.sort();

    let media_count = messages.iter().filter(|m| m.is_media_message).count();

    let mut title = title_from_filename(filename);
    if title.eq_ignore_ascii_case("whatsapp chat") && !participants.is_empty() {
        title = participants
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if participants.len() > 3 {
            title.push_str(&format!(" +{}", participants.len() - 3));
        }
    }

    ParsedChat {
        start_date: messages.first().map(|m| m.timestamp),
        end_date: messages.last().map(|m| m.timestamp),
        message_count: messages.len(),
        media_count,
        messages,
        participants,
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
15/01/2024, 10:30 - Alice: Hello Bob!
15/01/2024, 10:31 - Bob: Hi Alice
this continues the previous line
15/01/2024, 10:32 - Alice: IMG-20240115-WA0001.jpg (file attached)
16/01/2024, 09:00 - Messages and calls are end-to-end encrypted.
";

    #[test]
    fn test_parse_basic_chat() {
        let chat = parse_chat(SAMPLE, "WhatsApp Chat with Bob.txt");
        assert_eq!(chat.message_count, 4);
        assert_eq!(chat.participants, vec!["Alice", "Bob"]);
        assert_eq!(chat.title, "Bob");
        assert_eq!(chat.media_count, 1);
    }

    #[test]
    fn test_continuation_merged() {
        let chat = parse_chat(SAMPLE, "chat.txt");
        let bob = &chat.messages[1];
        assert_eq!(bob.content, "Hi Alice\nthis continues the previous line");
        assert!(bob.raw_line.contains('\n'));
    }

    #[test]
    fn test_media_classification() {
        let chat = parse_chat(SAMPLE, "chat.txt");
        let media = &chat.messages[2];
        assert!(media.is_media_message);
        assert_eq!(media.media_type, Some(MediaType::Image));
    }

    #[test]
    fn test_media_type_from_continuation_line() {
        // The filename can arrive on a continuation line after the
        // media placeholder; classification must see the merged text.
        let chat = parse_chat(
            "1/5/24, 10:30 AM - Alice: Hello!\n1/5/24, 10:31 AM - Bob: <Media omitted>\nphoto.jpg",
            "_chat.txt",
        );
        let media = &chat.messages[1];
        assert_eq!(media.content, "<Media omitted>\nphoto.jpg");
        assert!(media.is_media_message);
        assert_eq!(media.media_type, Some(MediaType::Image));
    }

    #[test]
    fn test_system_message_without_sender() {
        let chat = parse_chat(SAMPLE, "chat.txt");
        let system = &chat.messages[3];
        assert!(system.is_system_message);
        assert_eq!(system.sender, "");
        // System senders never become participants.
        assert!(!chat.participants.iter().any(String::is_empty));
    }

    #[test]
    fn test_system_message_with_sender() {
        let chat = parse_chat("15/01/2024, 10:30 - Alice: Alice created group \"Trip\"", "c.txt");
        assert!(chat.messages[0].is_system_message);
        assert!(chat.participants.is_empty());
    }

    #[test]
    fn test_ids_deterministic_across_parses() {
        let a = parse_chat(SAMPLE, "chat.txt");
        let b = parse_chat(SAMPLE, "chat.txt");
        let ids_a: Vec<_> = a.messages.iter().map(|m| &m.id).collect();
        let ids_b: Vec<_> = b.messages.iter().map(|m| &m.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_identical_messages_get_collision_suffixes() {
        let dup = "15/01/2024, 10:30 - Alice: same\n15/01/2024, 10:30 - Alice: same";
        let chat = parse_chat(dup, "chat.txt");
        assert_eq!(chat.message_count, 2);
        assert_ne!(chat.messages[0].id, chat.messages[1].id);
        assert!(chat.messages[1].id.ends_with("_1"));
        assert!(chat.messages[1].id.starts_with(&chat.messages[0].id));
    }

    #[test]
    fn test_orphan_continuation_dropped() {
        let chat = parse_chat("no header here\n15/01/2024, 10:30 - A: x", "c.txt");
        assert_eq!(chat.message_count, 1);
        assert_eq!(chat.messages[0].content, "x");
    }

    #[test]
    fn test_empty_input() {
        let chat = parse_chat("", "chat.txt");
        assert_eq!(chat.message_count, 0);
        assert!(chat.start_date.is_none());
        assert!(chat.end_date.is_none());
    }

    #[test]
    fn test_start_and_end_dates() {
        let chat = parse_chat(SAMPLE, "chat.txt");
        assert!(chat.start_date.unwrap() < chat.end_date.unwrap());
    }

    #[test]
    fn test_title_prefix_stripping() {
        assert_eq!(title_from_filename("WhatsApp Chat with Maria.txt"), "Maria");
        assert_eq!(title_from_filename("WhatsApp Chat - Team.txt"), "Team");
        assert_eq!(
            title_from_filename("Conversa do WhatsApp com João.txt"),
            "João"
        );
        assert_eq!(title_from_filename("Chat do WhatsApp com Ana.txt"), "Ana");
        assert_eq!(title_from_filename("random.txt"), "random");
    }

    #[test]
    fn test_generic_title_falls_back_to_participants() {
        let many = "\
15/01/2024, 10:30 - Dave: a
15/01/2024, 10:31 - Carol: b
15/01/2024, 10:32 - Alice: c
15/01/2024, 10:33 - Bob: d
";
        let chat = parse_chat(many, "WhatsApp Chat.txt");
        assert_eq!(chat.title, "Alice, Bob, Carol +1");
    }

    #[test]
    fn test_detect_media_type_precedence() {
        assert_eq!(detect_media_type("photo.jpg sent"), Some(MediaType::Image));
        assert_eq!(detect_media_type("VID-001.mp4"), Some(MediaType::Video));
        assert_eq!(detect_media_type("PTT-20240101.opus"), Some(MediaType::Audio));
        assert_eq!(detect_media_type("STK-123.webp"), Some(MediaType::Sticker));
        assert_eq!(detect_media_type("card.vcf"), Some(MediaType::Contact));
        assert_eq!(
            detect_media_type("live location shared"),
            Some(MediaType::Location)
        );
        // .svg has no dedicated image keyword, it lands in documents.
        assert_eq!(detect_media_type("diagram.svg"), Some(MediaType::Document));
        assert_eq!(detect_media_type("plain text"), None);
    }

    #[test]
    fn test_multi_locale_media_indicators() {
        assert!(is_media_message("<Media omitted>"));
        assert!(is_media_message("<Mídia oculta>"));
        assert!(is_media_message("IMG-1.jpg (arquivo anexado)"));
        assert!(!is_media_message("let's meet at the media center"));
    }

    #[test]
    fn test_base36_rendering() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
