//! Built-in tool contracts.
//!
//! Each function here is pure data: it declares how one scanner takes its
//! targets and options and how its stdout reads back. Nothing in the
//! dispatch pipeline knows these names.

use serde_json::json;

use crate::error::RegistryError;
use crate::registry::ToolSpecRegistry;
use crate::spec::{
    FlagTemplate, JoinRule, LineExtractor, OutputFormat, Render, TableLayout, TimeoutPolicy,
    ToolSpec, ToolSpecBuilder, ValueKind,
};

const HTTPX_INSTALL: &str =
    "Install projectdiscovery httpx: go install -v github.com/projectdiscovery/httpx/cmd/httpx@latest";

/// Every built-in tool, in listing order.
pub fn builtin_specs() -> Result<Vec<ToolSpec>, RegistryError> {
    Ok(vec![
        nuclei()?,
        ffuf()?,
        wfuzz()?,
        sqlmap()?,
        nmap()?,
        hashcat()?,
        httpx()?,
        subfinder()?,
        tlsx()?,
        xsstrike()?,
        amass()?,
        dirsearch()?,
        gospider()?,
        gospider_filtered()?,
        arjun()?,
        arjun_bulk()?,
        arjun_custom()?,
    ])
}

pub fn builtin_registry() -> Result<ToolSpecRegistry, RegistryError> {
    let mut registry = ToolSpecRegistry::new();
    for spec in builtin_specs()? {
        registry.register(spec)?;
    }
    Ok(registry)
}

fn port_number() -> ValueKind {
    ValueKind::Integer { min: 1, max: 65535 }
}

fn status_codes() -> ValueKind {
    ValueKind::IntegerList { min: 100, max: 599 }
}

fn nuclei() -> Result<ToolSpec, RegistryError> {
    ToolSpec::builder("nuclei_scan_wrapper", "nuclei")
        .description("Run a Nuclei template scan against URLs or hosts")
        .install_hint(
            "Install nuclei: go install -v github.com/projectdiscovery/nuclei/v3/cmd/nuclei@latest",
        )
        .single(Render::flag("-u"))
        .list(&["-l", "/dev/stdin"])
        .base_args(&["-jsonl", "-silent", "-no-color"])
        .flag(
            FlagTemplate::new("templates", ValueKind::TextList, Render::flag("-t"))
                .describe("Template names or paths to run"),
        )
        .flag(
            FlagTemplate::new(
                "severity",
                ValueKind::choice_list(&["info", "low", "medium", "high", "critical", "unknown"]),
                Render::flag("-severity"),
            )
            .describe("Only run templates of these severities"),
        )
        .timeout(TimeoutPolicy::scaled(300, 60))
        .build()
}

fn ffuf() -> Result<ToolSpec, RegistryError> {
    ToolSpec::builder("ffuf_wrapper", "ffuf")
        .description("Fuzz web endpoints with ffuf; the URL must contain the FUZZ keyword")
        .install_hint("Install ffuf: go install github.com/ffuf/ffuf/v2@latest")
        .single(Render::flag("-u"))
        .base_args(&["-json", "-s", "-noninteractive"])
        .flag(
            FlagTemplate::new("wordlist", ValueKind::FilePath, Render::flag("-w"))
                .required()
                .describe("Path to the wordlist file"),
        )
        .flag(
            FlagTemplate::new("filter_code", status_codes(), Render::flag("-fc"))
                .default_value(json!("404"))
                .describe("HTTP status codes to filter out"),
        )
        .timeout(TimeoutPolicy::fixed(600))
        .build()
}

fn wfuzz() -> Result<ToolSpec, RegistryError> {
    let tool = "wfuzz_wrapper";
    ToolSpec::builder(tool, "wfuzz")
        .description("Fuzz web endpoints with wfuzz; the URL must contain the FUZZ keyword")
        .install_hint("Install wfuzz: pip install wfuzz")
        .single(Render::Positional)
        .base_args(&["-Z"])
        .flag(
            FlagTemplate::new("wordlist", ValueKind::FilePath, Render::flag("-w"))
                .required()
                .describe("Path to the wordlist file"),
        )
        .flag(
            FlagTemplate::new("hide_code", status_codes(), Render::flag("--hc"))
                .default_value(json!("404"))
                .describe("HTTP status codes to hide from results"),
        )
        .output(OutputFormat::PlainText(LineExtractor::new(
            tool,
            r#"^(?P<id>\d+):\s+(?P<code>\d{3})\s+(?P<lines>\d+) L\s+(?P<words>\d+) W\s+(?P<chars>\d+) Ch\s+"(?P<payload>.*)"$"#,
        )?))
        .timeout(TimeoutPolicy::fixed(600))
        .build()
}

fn sqlmap() -> Result<ToolSpec, RegistryError> {
    let tool = "sqlmap_wrapper";
    ToolSpec::builder(tool, "sqlmap")
        .description("Test a URL for SQL injection with sqlmap")
        .install_hint("Install sqlmap: pip install sqlmap")
        .single(Render::flag("-u"))
        .base_args(&["--batch", "--output-dir=/tmp/sqlmap", "--disable-coloring"])
        .flag(
            FlagTemplate::new("risk", ValueKind::Integer { min: 1, max: 3 }, Render::flag("--risk"))
                .default_value(json!(1))
                .describe("Risk of tests to perform (1-3)"),
        )
        .flag(
            FlagTemplate::new("level", ValueKind::Integer { min: 1, max: 5 }, Render::flag("--level"))
                .default_value(json!(1))
                .describe("Level of tests to perform (1-5)"),
        )
        .output(OutputFormat::PlainText(LineExtractor::new(
            tool,
            r"parameter '(?P<parameter>.+)' (?:is|appears to be) '(?P<technique>.+)' injectable",
        )?))
        .timeout(TimeoutPolicy::fixed(900))
        .build()
}

fn nmap() -> Result<ToolSpec, RegistryError> {
    let tool = "nmap_wrapper";
    ToolSpec::builder(tool, "nmap")
        .description("Scan hosts and ports with nmap")
        .install_hint("Install nmap from your distribution, e.g. apt install nmap")
        .single(Render::Positional)
        .list(&["-iL", "-"])
        .base_args(&["-oG", "-"])
        .flag(
            FlagTemplate::new("ports", ValueKind::pattern(tool, r"^[TU0-9:,\-]+$")?, Render::flag("-p"))
                .describe("Ports to scan, e.g. 22,80,443, 1-1024, or - for all ports"),
        )
        .flag(
            FlagTemplate::new("scan_type", ValueKind::pattern(tool, r"^s[A-Za-z]$")?, Render::attached("-"))
                .default_value(json!("sV"))
                .describe("Scan technique, e.g. sV for version detection or sS for SYN scan"),
        )
        .output(OutputFormat::PlainText(LineExtractor::new(
            tool,
            r"^Host: (?P<host>\S+) \((?P<hostname>[^)]*)\)\s+(?:Status: (?P<status>\w+)|Ports: (?P<ports>[^\t]+))",
        )?))
        .timeout(TimeoutPolicy::scaled(300, 120))
        .exit_code_significant()
        .build()
}

fn hashcat() -> Result<ToolSpec, RegistryError> {
    let aliases = [
        ("md5", 0),
        ("sha1", 100),
        ("sha256", 1400),
        ("sha512", 1700),
        ("ntlm", 1000),
        ("bcrypt", 3200),
    ];
    ToolSpec::builder("hashcat_wrapper", "hashcat")
        .description("Crack a file of hashes against a wordlist with hashcat")
        .install_hint("Install hashcat from https://hashcat.net/hashcat/ or your distribution")
        .single(Render::Positional)
        .base_args(&["--potfile-disable", "--quiet", "--outfile-format=1,2"])
        .flag(
            FlagTemplate::new(
                "hash_type",
                ValueKind::Aliased {
                    aliases: aliases.iter().map(|(a, m)| (a.to_string(), *m)).collect(),
                    min: 0,
                    max: 99999,
                },
                Render::flag("-m"),
            )
            .required()
            .describe("Hash mode number or one of md5, sha1, sha256, sha512, ntlm, bcrypt"),
        )
        .flag(
            FlagTemplate::new("wordlist", ValueKind::FilePath, Render::Positional)
                .required()
                .describe("Path to the wordlist file"),
        )
        .output(OutputFormat::StructuredTable(TableLayout::new(
            ':',
            &["hash", "plaintext"],
        )))
        .timeout(TimeoutPolicy::fixed(1800))
        .build()
}

fn httpx() -> Result<ToolSpec, RegistryError> {
    ToolSpec::builder("httpx_wrapper", "httpx")
        .description("Probe URLs or hosts for live HTTP services with projectdiscovery httpx")
        .install_hint(HTTPX_INSTALL)
        .single(Render::flag("-u"))
        .list(&["-l", "-"])
        .base_args(&["-json", "-silent", "-timeout", "10"])
        .flag(
            FlagTemplate::new("status_codes", status_codes(), Render::flag("-mc"))
                .describe("Only keep responses with these status codes"),
        )
        .timeout(TimeoutPolicy::scaled(20, 15))
        .impostor_markers(&[
            "command line client could not run",
            "required dependencies",
            "pip install 'httpx[cli]'",
        ])
        .build()
}

fn subfinder() -> Result<ToolSpec, RegistryError> {
    ToolSpec::builder("subfinder_wrapper", "subfinder")
        .description("Enumerate subdomains passively with subfinder")
        .install_hint(
            "Install subfinder: go install -v github.com/projectdiscovery/subfinder/v2/cmd/subfinder@latest",
        )
        .single(Render::flag("-d"))
        .list(&["-dL", "-"])
        .base_args(&["-json", "-silent"])
        .flag(
            FlagTemplate::new("recursive", ValueKind::Bool, Render::switch("-recursive"))
                .default_value(json!(false))
                .describe("Use sources that support recursive enumeration"),
        )
        .timeout(TimeoutPolicy::scaled(120, 60))
        .build()
}

fn tlsx() -> Result<ToolSpec, RegistryError> {
    ToolSpec::builder("tlsx_wrapper", "tlsx")
        .description("Collect TLS certificate data with tlsx")
        .install_hint("Install tlsx: go install github.com/projectdiscovery/tlsx/cmd/tlsx@latest")
        .single(Render::flag("-u"))
        .list(&["-l", "-"])
        .base_args(&["-json", "-silent"])
        .flag(
            FlagTemplate::new("port", port_number(), Render::flag("-p"))
                .default_value(json!(443))
                .describe("TLS port to connect to"),
        )
        .timeout(TimeoutPolicy::scaled(30, 10))
        .build()
}

fn xsstrike() -> Result<ToolSpec, RegistryError> {
    let tool = "xsstrike_wrapper";
    ToolSpec::builder(tool, "xsstrike")
        .description("Test a URL for cross-site scripting with XSStrike")
        .install_hint("Install XSStrike from https://github.com/s0md3v/XSStrike and expose it as 'xsstrike'")
        .single(Render::flag("-u"))
        .base_args(&["--skip"])
        .flag(
            FlagTemplate::new("crawl", ValueKind::Bool, Render::switch("--crawl"))
                .default_value(json!(false))
                .describe("Crawl the target and test every discovered page"),
        )
        .output(OutputFormat::PlainText(LineExtractor::new(
            tool,
            r"^\[\+\] (?P<label>[^:]+): (?P<value>.+)$",
        )?))
        .timeout(TimeoutPolicy::fixed(900))
        .build()
}

fn amass() -> Result<ToolSpec, RegistryError> {
    let tool = "amass_wrapper";
    ToolSpec::builder(tool, "amass")
        .description("Map the attack surface of a domain with amass enum")
        .install_hint("Install amass: go install -v github.com/owasp-amass/amass/v4/...@master")
        .single(Render::flag("-d"))
        .list(&["-df", "/dev/stdin"])
        .base_args(&["enum", "-nocolor"])
        .flag(
            FlagTemplate::new("passive", ValueKind::Bool, Render::switch("-passive"))
                .default_value(json!(true))
                .describe("Passive enumeration only"),
        )
        .output(OutputFormat::PlainText(LineExtractor::new(
            tool,
            r"^(?P<name>[\w.-]+\.\w+)(?:\s+(?P<addresses>\S+))?$",
        )?))
        .timeout(TimeoutPolicy::fixed(1800))
        .build()
}

fn dirsearch() -> Result<ToolSpec, RegistryError> {
    let tool = "dirsearch_wrapper";
    ToolSpec::builder(tool, "dirsearch")
        .description("Brute-force web paths with dirsearch")
        .install_hint("Install dirsearch: pip install dirsearch")
        .single(Render::flag("-u"))
        .list(&["--stdin"])
        .base_args(&["--no-color"])
        .flag(
            FlagTemplate::new("extensions", ValueKind::TextList, Render::flag("-e"))
                .describe("File extensions to append, e.g. php,html"),
        )
        .flag(
            FlagTemplate::new("wordlist", ValueKind::FilePath, Render::flag("-w"))
                .describe("Path to a custom wordlist"),
        )
        .output(OutputFormat::PlainText(LineExtractor::new(
            tool,
            r"^(?:\[[\d:]+\]\s+)?(?P<status>\d{3})\s+-\s+(?P<size>\S+)\s+-\s+(?P<path>\S+)",
        )?))
        .timeout(TimeoutPolicy::scaled(300, 300))
        .build()
}

/// Options shared by both gospider variants.
fn gospider_crawl_flags() -> Vec<FlagTemplate> {
    vec![
        FlagTemplate::new("depth", ValueKind::Integer { min: 0, max: 10 }, Render::flag("-d"))
            .default_value(json!(3))
            .describe("Crawl depth; 0 means unlimited"),
        FlagTemplate::new("concurrent", ValueKind::Integer { min: 1, max: 100 }, Render::flag("-c"))
            .default_value(json!(10))
            .describe("Maximum concurrent requests per domain"),
        FlagTemplate::new("timeout", ValueKind::Integer { min: 1, max: 300 }, Render::flag("-m"))
            .default_value(json!(10))
            .describe("Request timeout in seconds"),
        FlagTemplate::new("include_subs", ValueKind::Bool, Render::switch("--subs"))
            .default_value(json!(false))
            .describe("Include subdomains"),
    ]
}

fn gospider_base(name: &str, description: &str) -> ToolSpecBuilder {
    let builder = ToolSpec::builder(name, "gospider")
        .description(description)
        .install_hint("Install gospider: go install github.com/jaeles-project/gospider@latest")
        .single(Render::flag("-s"))
        .list(&["-S", "/dev/stdin"])
        .base_args(&["--json", "-q"])
        .timeout(TimeoutPolicy::scaled(300, 120));
    with_flags(builder, gospider_crawl_flags())
}

fn gospider() -> Result<ToolSpec, RegistryError> {
    gospider_base("gospider_scan", "Crawl sites and collect URLs with gospider")
        .flag(
            FlagTemplate::new("user_agent", ValueKind::Text, Render::flag("-u"))
                .describe("User agent: web, mobi, or a custom string"),
        )
        .flag(
            FlagTemplate::new("headers", ValueKind::TextList, Render::flag("-H"))
                .join(JoinRule::Repeat)
                .describe("Extra request headers, e.g. 'Cookie: a=b'"),
        )
        .flag(
            FlagTemplate::new("include_other_source", ValueKind::Bool, Render::switch("--other-source"))
                .default_value(json!(false))
                .describe("Also collect URLs from Archive.org, CommonCrawl and VirusTotal"),
        )
        .build()
}

fn extension_regex() -> JoinRule {
    JoinRule::Wrapped {
        prefix: r"\.(".to_string(),
        separator: "|".to_string(),
        suffix: ")$".to_string(),
    }
}

fn gospider_filtered() -> Result<ToolSpec, RegistryError> {
    gospider_base(
        "gospider_filtered_scan",
        "Crawl sites with gospider, keeping or dropping URLs by extension and length",
    )
    .flag(
        FlagTemplate::new("extensions", ValueKind::TextList, Render::flag("--whitelist"))
            .join(extension_regex())
            .describe("Only report URLs with these extensions"),
    )
    .flag(
        FlagTemplate::new("exclude_extensions", ValueKind::TextList, Render::flag("--blacklist"))
            .join(extension_regex())
            .describe("Drop URLs with these extensions"),
    )
    .flag(
        FlagTemplate::new(
            "filter_length",
            ValueKind::IntegerList { min: 0, max: i64::MAX },
            Render::flag("--filter-length"),
        )
        .describe("Drop responses with these body lengths"),
    )
    .build()
}

/// Options shared by the arjun variants.
fn arjun_flags(timeout: bool) -> Vec<FlagTemplate> {
    let mut flags = vec![
        FlagTemplate::new(
            "method",
            ValueKind::choice(&["GET", "POST", "JSON", "XML"]),
            Render::flag("-m"),
        )
        .default_value(json!("GET"))
        .describe("Request method used for parameter discovery"),
        FlagTemplate::new("wordlist", ValueKind::FilePath, Render::flag("-w"))
            .describe("Path to a custom parameter wordlist"),
        FlagTemplate::new("threads", ValueKind::Integer { min: 1, max: 100 }, Render::flag("-t"))
            .default_value(json!(25))
            .describe("Concurrent threads"),
        FlagTemplate::new("stable", ValueKind::Bool, Render::switch("--stable"))
            .default_value(json!(false))
            .describe("Favour reliability over speed"),
    ];
    if timeout {
        flags.push(
            FlagTemplate::new("timeout", ValueKind::Integer { min: 1, max: 300 }, Render::flag("-T"))
                .default_value(json!(10))
                .describe("Request timeout in seconds"),
        );
    }
    flags
}

fn arjun_output(tool: &str) -> Result<OutputFormat, RegistryError> {
    Ok(OutputFormat::PlainText(LineExtractor::new(
        tool,
        r"Parameters found: (?P<parameters>.+)$",
    )?))
}

fn with_flags(
    builder: ToolSpecBuilder,
    flags: Vec<FlagTemplate>,
) -> ToolSpecBuilder {
    flags.into_iter().fold(builder, |builder, flag| builder.flag(flag))
}

fn arjun() -> Result<ToolSpec, RegistryError> {
    let tool = "arjun_scan";
    let builder = ToolSpec::builder(tool, "arjun")
        .description("Discover hidden HTTP parameters of a URL with Arjun")
        .install_hint("Install Arjun: pip install arjun")
        .single(Render::flag("-u"))
        .output(arjun_output(tool)?)
        .timeout(TimeoutPolicy::fixed(600));
    with_flags(builder, arjun_flags(true))
        .flag(
            FlagTemplate::new("headers", ValueKind::TextList, Render::flag("--headers"))
                .join(JoinRule::Separator("\n".to_string()))
                .describe("Extra request headers, e.g. 'Authorization: Bearer x'"),
        )
        .flag(
            FlagTemplate::new("data", ValueKind::Text, Render::flag("--include"))
                .describe("Parameters sent with every request, e.g. 'token=abc'"),
        )
        .flag(
            FlagTemplate::new("delay", ValueKind::Integer { min: 0, max: 60 }, Render::flag("-d"))
                .default_value(json!(0))
                .describe("Delay between requests in seconds"),
        )
        .build()
}

fn arjun_bulk() -> Result<ToolSpec, RegistryError> {
    let tool = "arjun_bulk_parameter_scan";
    let builder = ToolSpec::builder(tool, "arjun")
        .description("Discover hidden HTTP parameters across many URLs with Arjun")
        .install_hint("Install Arjun: pip install arjun")
        .list(&["-i", "/dev/stdin"])
        .output(arjun_output(tool)?)
        .timeout(TimeoutPolicy::scaled(120, 300));
    with_flags(builder, arjun_flags(false)).build()
}

fn arjun_custom() -> Result<ToolSpec, RegistryError> {
    let tool = "arjun_custom_parameter_scan";
    let builder = ToolSpec::builder(tool, "arjun")
        .description("Run Arjun with caller-supplied parameters always included")
        .install_hint("Install Arjun: pip install arjun")
        .single(Render::flag("-u"))
        .output(arjun_output(tool)?)
        .timeout(TimeoutPolicy::fixed(600));
    with_flags(builder, arjun_flags(true))
        .flag(
            FlagTemplate::new("custom_params", ValueKind::TextList, Render::flag("--include"))
                .join(JoinRule::Separator("&".to_string()))
                .describe("Parameters to include, e.g. ['id=1', 'debug=true']"),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::InputMode;

    #[test]
    fn test_builtin_registry_builds() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.count(), 17);
        assert!(registry.get("ipinfo_wrapper").is_none());
    }

    #[test]
    fn test_list_only_and_single_only_tools() {
        let registry = builtin_registry().unwrap();

        let bulk = registry.get("arjun_bulk_parameter_scan").unwrap();
        assert!(!bulk.supports(InputMode::Single));
        assert!(bulk.supports(InputMode::List));

        let sqlmap = registry.get("sqlmap_wrapper").unwrap();
        assert!(sqlmap.supports(InputMode::Single));
        assert!(!sqlmap.supports(InputMode::List));
    }

    #[test]
    fn test_httpx_contract() {
        let spec = httpx().unwrap();
        assert_eq!(spec.base_args, vec!["-json", "-silent", "-timeout", "10"]);
        assert_eq!(spec.target.list_args, vec!["-l", "-"]);
        assert_eq!(spec.impostor_markers.len(), 3);
        assert!(spec.install_hint.contains("projectdiscovery/httpx"));
    }
}
