//! Identifier minting
use bech32::Bech32m;
use uuid7::uuid7;

// Mint a fresh uuid7 and encode it as bech32 under the given prefix, so ids
// are sortable by creation time and self-describing ("order1...", "bid1...").
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}
