pub mod headerindex;
pub mod kvtable;
