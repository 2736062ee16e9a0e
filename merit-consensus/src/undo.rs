//! `BlockUndo` (§6.4): what `DisconnectBlock` needs to put a block's
//! effects back in reverse. Wire layout follows the same `Cursor`-based
//! encode/decode convention as `merit_referral::referral::Referral`.

use std::io::{Cursor, Read, Write};

use merit_crypto::hash::Hash;
use merit_referral::{Address, UnspentOutput};
use thiserror::Error;

/// The sentinel value for [`LotteryUndo::replaced_address_type`] that
/// marks "invite-tx undos follow" on the wire (§6.4, §9 "Lottery undo
/// determinism"). Any implementation parsing a `LotteryUndo` stream MUST
/// stop treating entries as lottery replacements the moment it sees this
/// value, and MUST emit it even on a block with zero invite undos so the
/// stream shape never depends on whether the list that follows is empty.
pub const LOTTERY_UNDO_SENTINEL: u8 = 100;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of block-undo buffer")]
    UnexpectedEof,
    #[error("lottery undo stream missing its sentinel entry")]
    MissingSentinel,
}

/// Everything a single non-coinbase transaction's connection spent, so
/// disconnecting it can restore those outputs to the UTXO set.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TxUndo {
    pub spent: Vec<UnspentOutput>,
}

/// One ambassador- or invite-lottery replacement to reverse: `old_winner`
/// was paid instead of `new_winner` (or vice versa, depending on
/// direction) when the block was first connected. `replaced_address_type`
/// mirrors the on-chain `AddressType` tag of `old_winner`, except for the
/// reserved [`LOTTERY_UNDO_SENTINEL`] value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LotteryUndo {
    pub replaced_address_type: u8,
    pub old_winner: Address,
    pub new_winner: Address,
}

/// An invite-transaction's undo: the invite outputs it spent, restored on
/// disconnect exactly like a coin `TxUndo` but tracked separately because
/// invites live in their own UTXO set (§3.1).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InviteTxUndo {
    pub spent: Vec<UnspentOutput>,
}

/// The full undo record for one block (§6.4): per non-coinbase tx, its
/// spent outputs; the lottery replacements to reverse; and, gated behind
/// the [`LOTTERY_UNDO_SENTINEL`] marker, the invite-tx undos.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlockUndo {
    pub tx_undos: Vec<TxUndo>,
    pub lottery_undos: Vec<LotteryUndo>,
    pub invite_undos: Vec<InviteTxUndo>,
}

fn write_unspent(cursor: &mut Cursor<Vec<u8>>, out: &UnspentOutput) {
    cursor.write_all(out.txid.as_ref()).unwrap();
    cursor.write_all(&out.vout.to_le_bytes()).unwrap();
    cursor.write_all(out.address.as_ref()).unwrap();
    cursor.write_all(&out.value.to_le_bytes()).unwrap();
    cursor.write_all(&out.height.to_le_bytes()).unwrap();
    cursor
        .write_all(&[out.is_invite as u8, out.is_coinbase as u8])
        .unwrap();
}

fn read_unspent(cursor: &mut Cursor<&[u8]>) -> Result<UnspentOutput, Error> {
    let mut txid = [0u8; 32];
    cursor.read_exact(&mut txid).map_err(|_| Error::UnexpectedEof)?;
    let mut vout = [0u8; 4];
    cursor.read_exact(&mut vout).map_err(|_| Error::UnexpectedEof)?;
    let mut address = [0u8; 20];
    cursor
        .read_exact(&mut address)
        .map_err(|_| Error::UnexpectedEof)?;
    let mut value = [0u8; 8];
    cursor.read_exact(&mut value).map_err(|_| Error::UnexpectedEof)?;
    let mut height = [0u8; 8];
    cursor
        .read_exact(&mut height)
        .map_err(|_| Error::UnexpectedEof)?;
    let mut flags = [0u8; 2];
    cursor.read_exact(&mut flags).map_err(|_| Error::UnexpectedEof)?;

    Ok(UnspentOutput {
        txid: Hash::from(txid),
        vout: u32::from_le_bytes(vout),
        address: Hash::from(address),
        value: u64::from_le_bytes(value),
        height: u64::from_le_bytes(height),
        is_invite: flags[0] != 0,
        is_coinbase: flags[1] != 0,
    })
}

fn write_len(cursor: &mut Cursor<Vec<u8>>, len: usize) {
    cursor.write_all(&(len as u32).to_le_bytes()).unwrap();
}

fn read_len(cursor: &mut Cursor<&[u8]>) -> Result<usize, Error> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf).map_err(|_| Error::UnexpectedEof)?;
    Ok(u32::from_le_bytes(buf) as usize)
}

impl BlockUndo {
    pub fn encode(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());

        write_len(&mut cursor, self.tx_undos.len());
        for tx_undo in &self.tx_undos {
            write_len(&mut cursor, tx_undo.spent.len());
            for out in &tx_undo.spent {
                write_unspent(&mut cursor, out);
            }
        }

        write_len(&mut cursor, self.lottery_undos.len() + 1);
        for lottery_undo in &self.lottery_undos {
            cursor
                .write_all(&[lottery_undo.replaced_address_type])
                .unwrap();
            cursor.write_all(lottery_undo.old_winner.as_ref()).unwrap();
            cursor.write_all(lottery_undo.new_winner.as_ref()).unwrap();
        }
        // sentinel: replaced_address_type == 100, winners zeroed.
        cursor.write_all(&[LOTTERY_UNDO_SENTINEL]).unwrap();
        cursor.write_all(Address::zero().as_ref()).unwrap();
        cursor.write_all(Address::zero().as_ref()).unwrap();

        write_len(&mut cursor, self.invite_undos.len());
        for invite_undo in &self.invite_undos {
            write_len(&mut cursor, invite_undo.spent.len());
            for out in &invite_undo.spent {
                write_unspent(&mut cursor, out);
            }
        }

        cursor.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(bytes);

        let tx_undo_count = read_len(&mut cursor)?;
        let mut tx_undos = Vec::with_capacity(tx_undo_count);
        for _ in 0..tx_undo_count {
            let spent_count = read_len(&mut cursor)?;
            let mut spent = Vec::with_capacity(spent_count);
            for _ in 0..spent_count {
                spent.push(read_unspent(&mut cursor)?);
            }
            tx_undos.push(TxUndo { spent });
        }

        let lottery_entry_count = read_len(&mut cursor)?;
        let mut lottery_undos = Vec::new();
        let mut saw_sentinel = false;
        for _ in 0..lottery_entry_count {
            let mut ty = [0u8; 1];
            cursor.read_exact(&mut ty).map_err(|_| Error::UnexpectedEof)?;
            let mut old_winner = [0u8; 20];
            cursor
                .read_exact(&mut old_winner)
                .map_err(|_| Error::UnexpectedEof)?;
            let mut new_winner = [0u8; 20];
            cursor
                .read_exact(&mut new_winner)
                .map_err(|_| Error::UnexpectedEof)?;

            if ty[0] == LOTTERY_UNDO_SENTINEL {
                saw_sentinel = true;
                break;
            }
            lottery_undos.push(LotteryUndo {
                replaced_address_type: ty[0],
                old_winner: Hash::from(old_winner),
                new_winner: Hash::from(new_winner),
            });
        }
        if !saw_sentinel {
            return Err(Error::MissingSentinel);
        }

        let invite_undo_count = read_len(&mut cursor)?;
        let mut invite_undos = Vec::with_capacity(invite_undo_count);
        for _ in 0..invite_undo_count {
            let spent_count = read_len(&mut cursor)?;
            let mut spent = Vec::with_capacity(spent_count);
            for _ in 0..spent_count {
                spent.push(read_unspent(&mut cursor)?);
            }
            invite_undos.push(InviteTxUndo { spent });
        }

        Ok(Self {
            tx_undos,
            lottery_undos,
            invite_undos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output(seed: u8) -> UnspentOutput {
        UnspentOutput {
            txid: Hash::from([seed; 32]),
            vout: seed as u32,
            address: Hash::from([seed; 20]),
            value: 5_000,
            height: 10,
            is_invite: seed % 2 == 0,
            is_coinbase: false,
        }
    }

    #[test]
    fn round_trips_with_no_invite_undos() {
        let undo = BlockUndo {
            tx_undos: vec![TxUndo {
                spent: vec![sample_output(1), sample_output(2)],
            }],
            lottery_undos: vec![LotteryUndo {
                replaced_address_type: 1,
                old_winner: Hash::from([3u8; 20]),
                new_winner: Hash::from([4u8; 20]),
            }],
            invite_undos: vec![],
        };

        let encoded = undo.encode();
        let decoded = BlockUndo::decode(&encoded).unwrap();
        assert_eq!(undo, decoded);
    }

    #[test]
    fn round_trips_with_invite_undos() {
        let undo = BlockUndo {
            tx_undos: vec![],
            lottery_undos: vec![],
            invite_undos: vec![InviteTxUndo {
                spent: vec![sample_output(9)],
            }],
        };

        let encoded = undo.encode();
        let decoded = BlockUndo::decode(&encoded).unwrap();
        assert_eq!(undo, decoded);
    }

    #[test]
    fn sentinel_never_collides_with_a_real_address_type() {
        let undo = BlockUndo::default();
        let encoded = undo.encode();
        // the lottery-undo count is 1 (sentinel only); its type byte must
        // be the sentinel value for decode to find it.
        let lottery_section_start = 4 + 4; // tx_undo count + (zero tx undos)
        let count_bytes = &encoded[lottery_section_start..lottery_section_start + 4];
        assert_eq!(u32::from_le_bytes(count_bytes.try_into().unwrap()), 1);
    }

    #[test]
    fn missing_sentinel_is_rejected() {
        let mut cursor = Cursor::new(Vec::new());
        write_len(&mut cursor, 0); // zero tx undos
        write_len(&mut cursor, 0); // zero lottery entries, including sentinel
        let bytes = cursor.into_inner();
        assert!(matches!(BlockUndo::decode(&bytes), Err(Error::MissingSentinel)));
    }
}
