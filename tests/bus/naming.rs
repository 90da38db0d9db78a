use mqbus::{Message, QueueNames, Request};

use crate::support::{CreateAccount, Echo, EchoResponse, MalformedEcho, Numbered};

fn response_of<R: Request>(_: &R) -> &'static str {
    std::any::type_name::<R::Response>()
}

#[test]
fn derived_type_names() {
    assert_eq!(Echo::TYPE, "Echo");
    assert_eq!(MalformedEcho::TYPE, Echo::TYPE);
    assert_eq!(Numbered::TYPE, "tests.numbered");
    assert_eq!(CreateAccount::inbound_queue(), "mq:CreateAccount.inq");
    assert_eq!(Numbered::dead_letter_queue(), "mq:tests.numbered.dlq");
    assert_eq!(QueueNames::exchange(Numbered::TYPE), "mx:tests.numbered");
}

#[test]
fn derived_response_types() {
    let echo = Echo { text: String::new() };
    assert_eq!(response_of(&echo), std::any::type_name::<EchoResponse>());
}
