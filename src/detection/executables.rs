use crate::error::ScanError;
use crate::message::Attachment;
use percent_encoding::percent_decode_str;

/// File extensions that are treated as directly executable.
pub const EXECUTABLES: &[&str] = &[
    "action", "apk", "app", "application", "appx", "bas", "bat", "bin", "cab", "chm", "class",
    "cmd", "com", "command", "cpl", "crt", "csh", "dex", "dll", "dmg", "docm", "drv", "elf",
    "exe", "gadget", "hlp", "hta", "inf", "ins", "inx", "ipa", "isu", "jar", "job", "js", "jse",
    "ksh", "lnk", "mach", "msc", "msh", "msh1", "msh2", "mshxml", "msi", "msp", "mst", "ocx",
    "osx", "out", "paf", "pif", "pkg", "plugin", "prg", "ps1", "ps1xml", "ps2", "ps2xml",
    "psc1", "psc2", "reg", "rgs", "run", "scf", "scr", "sct", "shb", "shs", "sh", "sys", "u3p",
    "vb", "vbe", "vbs", "vbscript", "vxd", "workflow", "ws", "wsc", "wsf", "wsh", "xbap",
    "xlsm", "xpi",
];

/// Preferred extension for MIME types that describe executables.
const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("application/x-msdownload", "exe"),
    ("application/x-msdos-program", "exe"),
    ("application/x-dosexec", "exe"),
    ("application/vnd.microsoft.portable-executable", "exe"),
    ("application/x-ms-installer", "msi"),
    ("application/x-msi", "msi"),
    ("application/x-ole-storage", "msi"),
    ("application/x-bat", "bat"),
    ("application/x-sh", "sh"),
    ("application/x-csh", "csh"),
    ("application/x-elf", "elf"),
    ("application/x-executable", "elf"),
    ("application/x-mach-binary", "mach"),
    ("application/java-archive", "jar"),
    ("application/x-java-archive", "jar"),
    ("application/java-vm", "class"),
    ("application/x-java-applet", "class"),
    ("application/javascript", "js"),
    ("text/javascript", "js"),
    ("application/x-javascript", "js"),
    ("application/hta", "hta"),
    ("application/x-ms-shortcut", "lnk"),
    ("application/vnd.ms-cab-compressed", "cab"),
    ("application/x-apple-diskimage", "dmg"),
    ("application/vnd.android.package-archive", "apk"),
    ("application/x-ms-application", "application"),
    ("text/vbscript", "vbs"),
    ("application/x-vbscript", "vbs"),
    ("application/vnd.ms-word.document.macroenabled.12", "docm"),
    ("application/vnd.ms-excel.sheet.macroenabled.12", "xlsm"),
    ("application/x-xpinstall", "xpi"),
];

pub fn is_executable_extension(extension: &str) -> bool {
    EXECUTABLES.contains(&extension)
}

/// Attachment checks for dangerous executables.
pub struct AttachmentAnalyzer;

impl AttachmentAnalyzer {
    /// Verdict messages for every attachment that looks executable, followed by
    /// the whitelist notice when anything was found.
    pub fn executable_messages(attachments: &[Attachment], whitelist_requests: &str) -> Vec<String> {
        let mut messages = Vec::new();

        for attachment in attachments {
            if let Some(ext) = Self::magic_extension(&attachment.content) {
                messages.push(format!(
                    "Attachment's \"magic number\" indicated it was a dangerous executable with a \".{ext}\" extension."
                ));
            }

            if let Some(ext) = attachment
                .filename
                .as_deref()
                .and_then(Self::file_name_extension)
                .filter(|ext| is_executable_extension(ext))
            {
                messages.push(format!(
                    "Attachment's file name indicated it was a dangerous executable with a \".{ext}\" extension."
                ));
            }

            if let Some(ext) = attachment
                .content_type
                .as_deref()
                .and_then(Self::content_type_extension)
                .filter(|ext| is_executable_extension(ext))
            {
                messages.push(format!(
                    "Attachment's Content-Type was a dangerous executable with a \".{ext}\" extension."
                ));
            }
        }

        if !messages.is_empty() {
            messages.push(format!(
                "Executable file whitelist requests can be filed at {whitelist_requests}.  You may want to re-send your attachment in a compressed archive format (e.g. a ZIP file)."
            ));
        }

        messages
    }

    /// Executable extension indicated by the content's magic bytes.
    pub fn magic_extension(content: &[u8]) -> Option<&'static str> {
        if content.is_empty() {
            return None;
        }
        let kind = infer::get(content)?;
        let ext = kind.extension();
        if is_executable_extension(ext) {
            Some(ext)
        } else {
            log::debug!("Attachment content is {} ({ext})", kind.mime_type());
            None
        }
    }

    /// Lower-cased extension of an attachment file name, after dropping any
    /// query suffix and undoing percent and punycode encoding.
    pub fn file_name_extension(filename: &str) -> Option<String> {
        let name = match decode_file_name(filename) {
            Ok(name) => name,
            Err(e) => {
                log::debug!("{e}");
                percent_decode_str(strip_query(filename))
                    .decode_utf8_lossy()
                    .to_lowercase()
            }
        };

        let name = name.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
        let (_, ext) = name.rsplit_once('.')?;
        let ext = ext.trim();
        (!ext.is_empty()).then(|| ext.to_string())
    }

    /// Extension for a declared Content-Type, ignoring parameters.
    pub fn content_type_extension(content_type: &str) -> Option<String> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if essence.is_empty() {
            return None;
        }

        MIME_EXTENSIONS
            .iter()
            .find(|(mime, _)| *mime == essence)
            .map(|(_, ext)| ext.to_string())
    }
}

fn strip_query(filename: &str) -> &str {
    filename.split('?').next().unwrap_or_default()
}

fn decode_file_name(filename: &str) -> Result<String, ScanError> {
    let decoded = percent_decode_str(strip_query(filename))
        .decode_utf8()
        .map_err(|e| ScanError::AttachmentInspection(format!("{filename}: {e}")))?;

    let (unicode, result) = idna::domain_to_unicode(&decoded);
    result.map_err(|e| {
        ScanError::AttachmentInspection(format!("{filename} has invalid punycode: {e:?}"))
    })?;

    idna::domain_to_ascii(&unicode).map_err(|e| {
        ScanError::AttachmentInspection(format!("{filename} cannot be converted to ASCII: {e:?}"))
    })
}
