//! Header validation against real-world header lines.

use hello_service::validator::HeaderValidator;

#[test]
fn test_response_headers_validate() {
    let validator = HeaderValidator::new();

    for header in [
        "Expires: Tue, 12 Feb 2019 16:07:23 GMT",
        "X-XSS-Protection: 0",
        "Cache-Control: public, max-age=31536000",
        "Strict-Transport-Security: max-age=31536000; includeSubDomains",
        "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:65.0) Gecko/20100101 Firefox/65.0",
        "Content-Language: fr-CA\t",
        "X-Custom: caf\u{e9}",
    ] {
        assert!(validator.is_valid(header), "{header:?} should be valid");
    }
}

#[test]
fn test_malformed_lines_rejected() {
    let validator = HeaderValidator::new();

    for header in [
        "\n\r",
        "Authentication:",
        "Authentication:   ",
        ": orphan value",
        "No colon here",
        "",
        "Bad Name: value",
        "X-Bell: ring\u{7}",
        "X-Delete: \u{7f}",
        "X-Wide: \u{2603}",
    ] {
        assert!(!validator.is_valid(header), "{header:?} should be invalid");
    }
}
