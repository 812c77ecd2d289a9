use pmosoap::soap::{
    Body, Envelope, Extension, FaultCode, Header, HeaderItem, QName, build_fault, roles, subcodes,
};

fn round_trip(envelope: &Envelope) -> Envelope {
    let xml = envelope.marshal().expect("envelope should serialize");
    Envelope::unmarshal(&xml).expect("marshalled envelope should parse")
}

#[test]
fn test_round_trip_payload_with_header() {
    let envelope = Envelope::with_header(
        Header::new(vec![
            HeaderItem::new(Extension::qualified("t", "urn:trace", "Trace").with_text("abc-123"))
                .with_must_understand(true)
                .with_role(roles::NEXT),
            HeaderItem::new(
                Extension::qualified("w", "urn:window", "Window")
                    .with_attribute("size", "10")
                    .with_child(Extension::text("start", "0")),
            )
            .with_relay(false)
            .with_encoding_style("urn:encoding:plain"),
        ]),
        Body::Payload(vec![
            Extension::qualified("m", "urn:calc", "Add")
                .with_child(Extension::text("a", "1"))
                .with_child(Extension::text("b", "<2> & \"3\"")),
            Extension::new("Second"),
        ]),
    );

    assert_eq!(round_trip(&envelope), envelope);
}

#[test]
fn test_round_trip_fault() {
    let fault = build_fault(
        FaultCode::Sender,
        "Argument b is not a number",
        [
            subcodes::bad_arguments(),
            QName::new("app", "urn:app:errors", "NotANumber"),
        ],
    )
    .with_reason("fr", "L'argument b n'est pas un nombre")
    .with_node("urn:pmosoap:node")
    .with_role(roles::ULTIMATE_RECEIVER)
    .with_detail(Extension::qualified("app", "urn:app:errors", "Argument").with_text("b"));

    let envelope = Envelope::fault(fault);
    let decoded = round_trip(&envelope);
    assert_eq!(decoded, envelope);

    let fault = decoded.body.fault().unwrap();
    assert_eq!(fault.reason.len(), 2);
    assert_eq!(fault.reason[1].lang, "fr");
    assert_eq!(fault.code.subcodes()[1].local, "NotANumber");
}

#[test]
fn test_minimal_fault_round_trip() {
    let envelope = Envelope::fault(build_fault(FaultCode::VersionMismatch, "", []));
    assert_eq!(round_trip(&envelope), envelope);
}

#[test]
fn test_absent_header_stays_absent() {
    let without = Envelope::new(Body::empty());
    let with_empty = Envelope::with_header(Header::default(), Body::empty());

    assert_eq!(without.marshal().unwrap(), with_empty.marshal().unwrap());
    assert!(round_trip(&with_empty).header.is_none());
}

#[test]
fn test_unknown_extensions_survive() {
    let xml = r#"<?xml version="1.0"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope" xmlns:x="urn:x">
  <env:Header>
    <x:Custom x:flag="on" env:mustUnderstand="false"><x:Deep><x:Deeper>v</x:Deeper></x:Deep></x:Custom>
  </env:Header>
  <env:Body>
    <x:Call><x:Arg kind="text">hello</x:Arg></x:Call>
  </env:Body>
</env:Envelope>"#;

    let first = Envelope::unmarshal(xml.as_bytes()).unwrap();
    let second = round_trip(&first);
    assert_eq!(first, second);

    let item = &second.header_items()[0];
    assert_eq!(item.must_understand(), Some(false));
    assert_eq!(item.content.attribute("flag"), Some("on"));
    let deep = item.content.child("Deep").unwrap();
    assert_eq!(deep.child("Deeper").unwrap().text_content(), "v");
}

#[test]
fn test_env_prefix_on_foreign_subcode_round_trips() {
    let fault = build_fault(
        FaultCode::Sender,
        "prefix clash",
        [QName::new("env", "urn:other", "Clash")],
    );
    let decoded = round_trip(&Envelope::fault(fault));

    let fault = decoded.body.fault().unwrap();
    assert_eq!(fault.kind(), FaultCode::Sender);
    let subcodes = fault.code.subcodes();
    assert!(subcodes[0].matches(Some("urn:other"), "Clash"));
}

#[test]
fn test_env_prefix_on_foreign_header_block_round_trips() {
    let item = HeaderItem::new(
        Extension::qualified("env", "urn:other", "Trace")
            .with_child(Extension::qualified("env", "urn:other", "Id").with_text("7")),
    )
    .with_must_understand(true)
    .with_role(roles::NEXT);
    let envelope = Envelope::with_header(Header::new(vec![item]), Body::empty());

    let decoded = round_trip(&envelope);
    assert_eq!(decoded, envelope);

    let item = &decoded.header_items()[0];
    assert_eq!(item.content.namespace(), Some("urn:other"));
    assert_eq!(item.must_understand(), Some(true));
    assert_eq!(item.role.as_deref(), Some(roles::NEXT));
    assert_eq!(item.content.child("Id").unwrap().namespace(), Some("urn:other"));
}
