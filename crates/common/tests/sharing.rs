mod common;

use ::common::crypto::{
    generate_params, CryptoError, DhKeyPair, SecretShare, WrapPrivateKey, WrapPublicKey,
};
use ::common::note::Note;

use crate::common::{random_master, rsa_recipient};

#[test]
fn test_note_shared_over_rsa() {
    let owner = random_master();
    let note = Note::new("plans", "meet at noon");
    let sealed = note.seal(&owner).unwrap();

    // recipient publishes a PEM public key; owner wraps the content key to it
    let pem = rsa_recipient().public().to_pem().unwrap();
    let recipient_public = WrapPublicKey::parse(pem.as_bytes()).unwrap();
    let content_key = sealed.content_key(&owner).unwrap();
    let share = SecretShare::wrap_rsa(&content_key, &recipient_public).unwrap();

    // share crosses the wire as base64
    let wire = share.to_base64();
    let received = SecretShare::from_base64(&wire).unwrap();

    let recovered = received.recover_rsa(rsa_recipient()).unwrap();
    assert_eq!(sealed.open_with_key(&recovered).unwrap(), note);
}

#[test]
fn test_note_shared_over_dh() {
    let params = generate_params();
    let owner = random_master();
    let note = Note::new("diary", "dear diary");
    let sealed = note.seal(&owner).unwrap();

    let alice = DhKeyPair::generate(&params).unwrap();
    let bob = DhKeyPair::generate(&params).unwrap();

    // both sides see the same fingerprint for each public value
    let bob_public = bob.public().to_hex().parse().unwrap();
    assert_eq!(
        ::common::crypto::fingerprint(&bob_public),
        bob.fingerprint()
    );

    let content_key = sealed.content_key(&owner).unwrap();
    let share = SecretShare::wrap_dh_from(&content_key, &alice, &bob_public, &params).unwrap();

    let recovered = share.recover_dh(&bob, &params).unwrap();
    assert_eq!(sealed.open_with_key(&recovered).unwrap(), note);
}

#[test]
fn test_share_for_someone_else_fails_closed() {
    let owner = random_master();
    let sealed = Note::new("t", "b").seal(&owner).unwrap();
    let content_key = sealed.content_key(&owner).unwrap();

    let share = SecretShare::wrap_rsa(&content_key, &rsa_recipient().public()).unwrap();

    let stranger = WrapPrivateKey::generate(2048).unwrap();
    assert_eq!(
        share.recover_rsa(&stranger),
        Err(CryptoError::Authentication)
    );
}

#[test]
fn test_tampered_rsa_share_fails_closed() {
    let content_key = ::common::crypto::Secret::generate().unwrap();
    let share = SecretShare::wrap_rsa(&content_key, &rsa_recipient().public()).unwrap();

    let mut bytes = share.to_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let tampered = SecretShare::from_bytes(&bytes).unwrap();

    assert_eq!(
        tampered.recover_rsa(rsa_recipient()),
        Err(CryptoError::Authentication)
    );
}
